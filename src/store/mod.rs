//! 存储模块
//!
//! 定义目标列表和探测历史的存储接口，并提供进程内实现

pub mod bootstrap;
pub mod memory;

use crate::error::Result;
use crate::health::ProbeOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// 重新导出主要类型
pub use bootstrap::connect_with_retry;
pub use memory::MemoryStore;

/// 仪表板每个目标默认展示的历史记录条数
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// 持久化的探测记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// 目标URL
    pub url: String,
    /// HTTP状态码，`0` 表示传输层失败
    pub status_code: u16,
    /// 延迟（毫秒）
    pub latency_ms: u64,
    /// 检测时间
    pub checked_at: DateTime<Utc>,
}

impl From<&ProbeOutcome> for ResultRecord {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            url: outcome.url.clone(),
            status_code: outcome.status_code,
            latency_ms: outcome.latency_ms(),
            checked_at: outcome.observed_at,
        }
    }
}

/// 目标存储trait
///
/// 监控核心只在每轮开始时读取一次快照，轮次中间的增删要到下一轮才可见。
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// 列出当前所有目标（URL唯一）
    async fn list_targets(&self) -> Result<Vec<String>>;

    /// 添加目标，已存在时不做任何事
    ///
    /// # 返回
    /// * `Result<bool>` - 是否为新添加的目标
    async fn add_target(&self, url: &str) -> Result<bool>;

    /// 删除目标
    ///
    /// # 返回
    /// * `Result<bool>` - 目标是否存在
    async fn remove_target(&self, url: &str) -> Result<bool>;
}

/// 探测结果存储trait
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 追加一条探测结果
    async fn append(&self, outcome: &ProbeOutcome) -> Result<()>;
}

/// 历史查询trait，供仪表板读取
#[async_trait]
pub trait HistoryQuery: Send + Sync {
    /// 每个目标最近 `per_url_limit` 条记录
    ///
    /// 结果按URL升序、同一URL内按检测时间降序排列。
    async fn recent_results(&self, per_url_limit: usize) -> Result<Vec<ResultRecord>>;
}
