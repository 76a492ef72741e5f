//! HTTP 服务：路由和启动

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::clients::GenerativeModel;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::TutorService;

/// 所有处理函数共享的上下文
///
/// 没有配置凭证时 `tutor` 为 `None`，需要模型的接口逐个请求返回 503，
/// 不影响讲义目录接口。
#[derive(Clone)]
pub struct AppContext {
    pub tutor: Option<Arc<TutorService>>,
    pub processed_dir: PathBuf,
}

impl AppContext {
    /// 创建上下文
    ///
    /// # 参数
    /// - `model`: 启动时构造好的模型客户端（凭证缺失时为 `None`）
    /// - `config`: 配置
    pub fn new(model: Option<Arc<dyn GenerativeModel>>, config: &Config) -> Self {
        Self {
            tutor: model.map(|m| Arc::new(TutorService::new(m, config.router_retry_policy()))),
            processed_dir: config.processed_dir.clone(),
        }
    }
}

/// 构建路由
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Tutor
        .route("/api/grade", post(super::handlers::grade))
        .route("/api/grade-exam", post(super::handlers::grade_exam))
        // Lecture catalogue
        .route("/api/classes", get(super::handlers::list_classes))
        .route("/api/classes/:id", get(super::handlers::get_class))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// 启动 HTTP 服务（阻塞直到服务退出）
pub async fn run(config: &Config, ctx: AppContext) -> AppResult<()> {
    if ctx.tutor.is_none() {
        warn!("⚠️ 未配置模型凭证，辅导接口将返回 503");
    }

    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| AppError::Other(format!("无法监听 {}: {}", config.bind_addr, e)))?;
    info!("🌐 HTTP 服务已启动: http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Other(format!("HTTP 服务异常退出: {}", e)))?;

    Ok(())
}
