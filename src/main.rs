use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use study_companion::api::{self, AppContext};
use study_companion::clients::{build_model, GeminiClient};
use study_companion::config::{Config, LlmProvider};
use study_companion::logger;
use study_companion::orchestrator::BatchExtractor;

/// 讲稿学习助手
#[derive(Parser, Debug)]
#[command(name = "study-companion")]
#[command(about = "Turn lecture transcripts into study notes and serve the tutor API")]
#[command(version)]
struct Args {
    /// TOML 配置文件（环境变量会覆盖其中的值）
    #[arg(short, long, env = "STUDY_COMPANION_CONFIG")]
    config: Option<PathBuf>,

    /// 输出 debug 级别日志
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 批量处理讲稿目录，生成结构化笔记
    Generate,
    /// 启动 HTTP 服务
    Serve {
        /// 监听地址，覆盖配置
        #[arg(long)]
        bind: Option<String>,
    },
    /// 列出凭证可用的模型
    ListModels,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置
    let mut config = Config::load(args.config.as_deref()).context("加载配置失败")?;
    if args.verbose {
        config.verbose_logging = true;
    }

    // 初始化日志
    logger::init(config.verbose_logging);

    match args.command {
        Command::Generate => generate(&config).await,
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            serve(&config).await
        }
        Command::ListModels => list_models(&config).await,
    }
}

async fn generate(config: &Config) -> Result<()> {
    let model = build_model(config).context("无法创建模型客户端")?;
    let summary = BatchExtractor::new(model, config)
        .run()
        .await
        .context("批处理无法启动")?;

    if summary.failed > 0 {
        warn!(
            "⚠️ {} 个讲稿处理失败，详见 {}",
            summary.failed, config.failure_log_file
        );
    }
    Ok(())
}

async fn serve(config: &Config) -> Result<()> {
    // 凭证缺失不阻止启动，辅导接口逐个请求返回 503
    let model = match build_model(config) {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("⚠️ {}", e);
            None
        }
    };

    let ctx = AppContext::new(model, config);
    api::run(config, ctx).await.context("HTTP 服务失败")?;
    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    if config.llm_provider != LlmProvider::Gemini {
        anyhow::bail!("list-models 只支持 gemini 提供方");
    }

    let api_key = config.require_api_key()?;
    let client = GeminiClient::new(
        api_key,
        config.llm_api_base_url.as_deref(),
        &config.llm_model_name,
        config.request_timeout(),
    )?;

    let models = client.list_models().await.context("获取模型列表失败")?;
    info!("✓ 共 {} 个模型", models.len());

    for model in &models {
        let generate = if model.supports_generate_content() { "✅" } else { "  " };
        println!(
            "{} {:<40} {:<30} in={} out={}",
            generate,
            model.model_id(),
            model.display_name.as_deref().unwrap_or("-"),
            model
                .input_token_limit
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            model
                .output_token_limit
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}
