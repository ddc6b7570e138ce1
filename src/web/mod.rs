//! Web API 模块
//!
//! 提供仪表板读取探测历史和管理监控目标的HTTP接口

pub mod handlers;
pub mod server;

use crate::store::{HistoryQuery, ResultRecord, TargetStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// 重新导出主要类型
pub use server::{build_app, build_router, WebServer};

/// Web 应用状态
#[derive(Clone)]
pub struct WebAppState {
    /// 目标存储
    pub targets: Arc<dyn TargetStore>,
    /// 历史查询
    pub history: Arc<dyn HistoryQuery>,
    /// 每个目标返回的历史记录条数
    pub history_limit: usize,
}

impl WebAppState {
    /// 创建新的应用状态
    pub fn new(
        targets: Arc<dyn TargetStore>,
        history: Arc<dyn HistoryQuery>,
        history_limit: usize,
    ) -> Self {
        Self {
            targets,
            history,
            history_limit,
        }
    }
}

/// 目标增删请求体
#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub url: String,
}

/// 仪表板展示的一条探测记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatEntry {
    pub url: String,
    pub status_code: u16,
    pub latency_ms: u64,
    /// 检测时间，格式 `HH:MM:SS`（UTC）
    pub checked_at: String,
}

impl From<ResultRecord> for StatEntry {
    fn from(record: ResultRecord) -> Self {
        Self {
            url: record.url,
            status_code: record.status_code,
            latency_ms: record.latency_ms,
            checked_at: record.checked_at.format("%H:%M:%S").to_string(),
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_stat_entry_formats_time_of_day() {
        let record = ResultRecord {
            url: "https://example.com".to_string(),
            status_code: 200,
            latency_ms: 42,
            checked_at: Utc.with_ymd_and_hms(2024, 5, 1, 7, 3, 9).unwrap(),
        };

        let entry = StatEntry::from(record);

        assert_eq!(entry.checked_at, "07:03:09");
        assert_eq!(entry.latency_ms, 42);
    }
}
