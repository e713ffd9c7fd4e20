//! LLM 服务 - 业务能力层
//!
//! 只负责"调用 LLM"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Ollama, Azure, Gemini 等）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, LlmError};

/// LLM 服务
///
/// 职责：
/// - 提供通用的 LLM 调用接口
/// - 所有基于 LLM 的协作方实现都应该基于此服务
/// - 不出现 RequestRecord
/// - 不关心流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        // 构建消息列表
        let mut messages = Vec::new();

        // 添加系统消息（如果提供）
        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(1024u32)
            .build()?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: self.model_name.clone(),
                })
            })?;

        Ok(content.trim().to_string())
    }
}

/// 从 LLM 响应中剥离 markdown 代码围栏，返回其中的 JSON 载荷
///
/// LLM 经常把 JSON 包在 ```json ... ``` 中返回，也可能直接返回裸 JSON。
pub fn extract_json_payload(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(fence_start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[fence_start + 3..];

    // 跳过语言标记（如 ```json）所在的行
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// 从 LLM 响应中解析 [0,1] 区间的分数
///
/// 响应中可能夹杂文字说明，取第一个出现的数字
pub fn parse_score_response(response: &str) -> Result<f64, AppError> {
    let re = Regex::new(r"\d+(?:\.\d+)?|\.\d+").expect("分数正则应当合法");

    let matched = re.find(response).ok_or_else(|| {
        AppError::Llm(LlmError::ScoreParseFailed {
            response: response.to_string(),
        })
    })?;

    let value: f64 = matched.as_str().parse().map_err(|_| {
        AppError::Llm(LlmError::ScoreParseFailed {
            response: response.to_string(),
        })
    })?;

    Ok(value)
}
