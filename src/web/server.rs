//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{handlers, WebAppState};
use crate::config::WebConfig;
use crate::error::{Result, SentinelError};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 构建API路由
pub fn build_router(state: WebAppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/stats", get(handlers::stats))
        .route(
            "/targets",
            get(handlers::list_targets)
                .post(handlers::add_target)
                .delete(handlers::delete_target),
        )
        .with_state(state)
}

/// 构建完整应用
///
/// 未匹配API路由的请求由 `static_dir` 下的仪表板页面处理
pub fn build_app(state: WebAppState, static_dir: &Path) -> Router {
    build_router(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 应用状态
    state: WebAppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, state: WebAppState) -> Self {
        Self { config, state }
    }

    /// 监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| {
                SentinelError::Other(anyhow::anyhow!(
                    "无效的监听地址 {}:{}: {}",
                    self.config.bind_address,
                    self.config.port,
                    e
                ))
            })
    }

    /// 绑定监听端口
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.socket_addr()?;
        TcpListener::bind(addr).await.map_err(|e| {
            SentinelError::Other(anyhow::anyhow!("Web服务器绑定 {} 失败: {}", addr, e))
        })
    }

    /// 在已绑定的监听器上提供服务，收到关闭信号后优雅退出
    ///
    /// # 参数
    /// * `listener` - 由 [`WebServer::bind`] 绑定的监听器
    /// * `shutdown_rx` - 关闭信号接收器
    pub async fn serve_until(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        self.serve(listener, async move {
            let _ = shutdown_rx.recv().await;
            info!("接收到关闭信号，正在关闭Web服务器...");
        })
        .await
    }

    /// 在已绑定的监听器上提供服务
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!("Web服务器已启动: http://{}", local_addr);
        info!("统计接口: http://{}/api/stats", local_addr);

        let app = build_app(self.state, &self.config.static_dir);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
