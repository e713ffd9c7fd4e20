use anyhow::Result;
use create_survey_questions::orchestrator::App;
use create_survey_questions::utils::logging;
use create_survey_questions::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
