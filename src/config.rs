use crate::models::DEFAULT_RELEVANCE_THRESHOLD;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的请求数量
    pub max_concurrent_requests: usize,
    /// 单次步进内同时发起的协作方调用上限
    pub max_concurrent_calls: usize,
    /// 单次协作方调用的超时时间（秒）
    pub call_timeout_secs: u64,
    /// 相关性阈值，分数严格高于该值的条目视为相关
    pub relevance_threshold: f64,
    /// TOML 请求定义文件存放目录
    pub request_folder: String,
    /// 结果输出目录
    pub output_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 文献搜索配置 ---
    /// 搜索后端："openalex" 或 "llm"
    pub search_backend: String,
    pub openalex_base_url: String,
    /// OpenAlex polite pool 的联系邮箱，为空则不发送
    pub openalex_mailto: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            max_concurrent_calls: 4,
            call_timeout_secs: 60,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            request_folder: "requests".to_string(),
            output_folder: "output".to_string(),
            verbose_logging: false,
            llm_api_key: "ollama".to_string(),
            llm_api_base_url: "http://localhost:11434/v1".to_string(),
            llm_model_name: "qwen3".to_string(),
            search_backend: "openalex".to_string(),
            openalex_base_url: "https://api.openalex.org".to_string(),
            openalex_mailto: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_requests),
            max_concurrent_calls: std::env::var("MAX_CONCURRENT_CALLS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_calls),
            call_timeout_secs: std::env::var("CALL_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.call_timeout_secs),
            relevance_threshold: std::env::var("RELEVANCE_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.relevance_threshold),
            request_folder: std::env::var("REQUEST_FOLDER").unwrap_or(default.request_folder),
            output_folder: std::env::var("OUTPUT_FOLDER").unwrap_or(default.output_folder),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            search_backend: std::env::var("SEARCH_BACKEND").unwrap_or(default.search_backend),
            openalex_base_url: std::env::var("OPENALEX_BASE_URL").unwrap_or(default.openalex_base_url),
            openalex_mailto: std::env::var("OPENALEX_MAILTO").unwrap_or(default.openalex_mailto),
        }
    }
}
