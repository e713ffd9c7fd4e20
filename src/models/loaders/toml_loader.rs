use crate::models::request::{RequestRecord, Settings};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// TOML 请求定义文件的内容
#[derive(Debug, Deserialize)]
struct RequestDefinition {
    #[serde(flatten)]
    settings: Settings,
    #[serde(default)]
    trace_file: Option<String>,
}

/// 从文件加载的一个请求，name 取自文件名，用于日志与结果输出
#[derive(Debug, Clone)]
pub struct LoadedRequest {
    pub name: String,
    pub record: RequestRecord,
}

/// 从 TOML 文件加载数据并转换为请求记录
pub async fn load_request_file(toml_file_path: &Path) -> Result<LoadedRequest> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let definition: RequestDefinition = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    let mut record = RequestRecord::new(definition.settings);
    record.trace_file = definition.trace_file;

    let name = toml_file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "request".to_string());

    Ok(LoadedRequest { name, record })
}

/// 从文件夹中加载所有 TOML 请求定义文件
pub async fn load_all_request_files(folder_path: &str) -> Result<Vec<LoadedRequest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut requests = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            tracing::info!(
                "正在加载: {}",
                path.file_name().unwrap_or_default().to_string_lossy()
            );

            match load_request_file(&path).await {
                Ok(request) => {
                    tracing::info!(
                        "成功加载请求: {}",
                        request.record.settings.research_question
                    );
                    requests.push(request);
                }
                Err(e) => {
                    tracing::warn!("加载文件失败 {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(requests)
}
