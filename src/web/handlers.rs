//! Web 路由处理函数
//!
//! 实现仪表板接口和目标管理接口

use super::{HealthResponse, StatEntry, TargetRequest, WebAppState};
use crate::config::is_probe_url;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info};

const INVALID_URL: &str = "Invalid URL";

/// 解析目标请求体，JSON无效或URL不是 http/https 时返回 `None`
fn parse_target_request(body: &[u8]) -> Option<String> {
    let request: TargetRequest = serde_json::from_slice(body).ok()?;
    let url = request.url.trim();
    is_probe_url(url).then(|| url.to_string())
}

/// 最近的探测记录
///
/// 查询失败时记录日志并返回空数组，仪表板始终拿到一个数组。
pub async fn stats(State(state): State<WebAppState>) -> Json<Vec<StatEntry>> {
    match state.history.recent_results(state.history_limit).await {
        Ok(records) => Json(records.into_iter().map(StatEntry::from).collect()),
        Err(e) => {
            error!("查询探测历史失败: {}", e);
            Json(Vec::new())
        }
    }
}

/// 列出所有目标
pub async fn list_targets(State(state): State<WebAppState>) -> Response {
    match state.targets.list_targets().await {
        Ok(targets) => Json(targets).into_response(),
        Err(e) => {
            error!("读取目标列表失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// 添加目标，重复添加同样返回 201
pub async fn add_target(State(state): State<WebAppState>, body: Bytes) -> Response {
    let Some(url) = parse_target_request(&body) else {
        return (StatusCode::BAD_REQUEST, INVALID_URL).into_response();
    };

    match state.targets.add_target(&url).await {
        Ok(inserted) => {
            if inserted {
                info!("添加监控目标: {}", url);
            }
            (StatusCode::CREATED, format!("Target added: {url}")).into_response()
        }
        Err(e) => {
            error!("添加目标失败 {}: {}", url, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// 删除目标，目标不存在时同样返回 200
pub async fn delete_target(State(state): State<WebAppState>, body: Bytes) -> Response {
    let Some(url) = parse_target_request(&body) else {
        return (StatusCode::BAD_REQUEST, INVALID_URL).into_response();
    };

    match state.targets.remove_target(&url).await {
        Ok(existed) => {
            if existed {
                info!("删除监控目标: {}", url);
            }
            (StatusCode::OK, format!("Target deleted: {url}")).into_response()
        }
        Err(e) => {
            error!("删除目标失败 {}: {}", url, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// 服务自身的存活检查
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}
