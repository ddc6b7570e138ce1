//! 进程内存储实现
//!
//! 目标与历史记录保存在内存中，可选地定期写入 JSON 快照文件

use crate::error::{Result, StoreError};
use crate::health::ProbeOutcome;
use crate::store::{HistoryQuery, ResultRecord, ResultSink, TargetStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 每个目标默认保留的历史记录条数
pub const DEFAULT_RETENTION_PER_TARGET: usize = 1000;

/// 快照文件内容
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreSnapshot {
    /// 目标列表
    #[serde(default)]
    targets: Vec<String>,
    /// 历史记录
    #[serde(default)]
    results: Vec<ResultRecord>,
}

/// 内存存储
#[derive(Debug)]
pub struct MemoryStore {
    /// 目标集合（按URL去重并排序）
    targets: RwLock<BTreeSet<String>>,
    /// 每个URL的历史记录，新记录在队尾
    results: RwLock<BTreeMap<String, VecDeque<ResultRecord>>>,
    /// 每个目标保留的记录条数
    retention: usize,
    /// 快照文件路径
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// 创建不落盘的内存存储
    ///
    /// # 参数
    /// * `retention` - 每个目标保留的记录条数（至少为1）
    pub fn new(retention: usize) -> Self {
        Self {
            targets: RwLock::new(BTreeSet::new()),
            results: RwLock::new(BTreeMap::new()),
            retention: retention.max(1),
            snapshot_path: None,
        }
    }

    /// 打开带快照文件的存储
    ///
    /// 文件不存在时从空存储开始；文件存在但无法读取或解析时返回错误。
    ///
    /// # 参数
    /// * `path` - 快照文件路径
    /// * `retention` - 每个目标保留的记录条数
    pub async fn open(path: impl AsRef<Path>, retention: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut store = Self::new(retention);
        store.snapshot_path = Some(path.to_path_buf());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Snapshot(format!("创建数据目录失败 {}: {}", parent.display(), e))
            })?;
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("快照文件不存在，使用空存储: {}", path.display());
                return Ok(store);
            }
            Err(e) => {
                return Err(
                    StoreError::Snapshot(format!("读取快照失败 {}: {}", path.display(), e)).into(),
                )
            }
        };

        let snapshot: StoreSnapshot = serde_json::from_str(&content)
            .map_err(|e| StoreError::Snapshot(format!("解析快照失败 {}: {}", path.display(), e)))?;

        store.load_snapshot(snapshot);
        info!(
            "已加载快照 {}: {} 个目标",
            path.display(),
            store.targets.get_mut().len()
        );
        Ok(store)
    }

    /// 用快照内容填充存储
    fn load_snapshot(&mut self, snapshot: StoreSnapshot) {
        let targets = self.targets.get_mut();
        targets.extend(snapshot.targets);

        let retention = self.retention;
        let results = self.results.get_mut();
        for record in snapshot.results {
            let history = results.entry(record.url.clone()).or_default();
            history.push_back(record);
            while history.len() > retention {
                history.pop_front();
            }
        }
    }

    /// 将当前内容写入快照文件
    ///
    /// 先写临时文件再重命名，避免写到一半时留下损坏的快照。
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = StoreSnapshot {
            targets: self.targets.read().await.iter().cloned().collect(),
            results: self
                .results
                .read()
                .await
                .values()
                .flat_map(|history| history.iter().cloned())
                .collect(),
        };

        let json = serde_json::to_vec(&snapshot)?;
        let tmp_path = temp_path(path);
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|e| StoreError::Snapshot(format!("写入快照失败 {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| StoreError::Snapshot(format!("替换快照失败 {}: {}", path.display(), e)))?;

        debug!("快照已写入: {}", path.display());
        Ok(())
    }

    /// 快照文件路径
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }
}

/// 快照的临时写入路径，在原文件名后追加 `.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_PER_TARGET)
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn list_targets(&self) -> Result<Vec<String>> {
        Ok(self.targets.read().await.iter().cloned().collect())
    }

    async fn add_target(&self, url: &str) -> Result<bool> {
        Ok(self.targets.write().await.insert(url.to_string()))
    }

    async fn remove_target(&self, url: &str) -> Result<bool> {
        Ok(self.targets.write().await.remove(url))
    }
}

#[async_trait]
impl ResultSink for MemoryStore {
    async fn append(&self, outcome: &ProbeOutcome) -> Result<()> {
        let mut results = self.results.write().await;
        let history = results.entry(outcome.url.clone()).or_default();
        history.push_back(ResultRecord::from(outcome));
        while history.len() > self.retention {
            history.pop_front();
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryQuery for MemoryStore {
    async fn recent_results(&self, per_url_limit: usize) -> Result<Vec<ResultRecord>> {
        let results = self.results.read().await;

        // BTreeMap 保证URL升序
        let records = results
            .values()
            .flat_map(|history| {
                let mut recent: Vec<ResultRecord> = history.iter().cloned().collect();
                recent.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
                recent.truncate(per_url_limit);
                recent
            })
            .collect();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    fn outcome_at(url: &str, status_code: u16, seconds_ago: i64) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::response(url, status_code, Duration::from_millis(7));
        outcome.observed_at = Utc::now() - ChronoDuration::seconds(seconds_ago);
        outcome
    }

    #[tokio::test]
    async fn test_targets_are_unique() {
        let store = MemoryStore::default();

        assert!(store.add_target("http://b").await.unwrap());
        assert!(store.add_target("http://a").await.unwrap());
        assert!(!store.add_target("http://a").await.unwrap());

        assert_eq!(
            store.list_targets().await.unwrap(),
            vec!["http://a".to_string(), "http://b".to_string()]
        );

        assert!(store.remove_target("http://a").await.unwrap());
        assert!(!store.remove_target("http://a").await.unwrap());
        assert_eq!(store.list_targets().await.unwrap(), vec!["http://b".to_string()]);
    }

    #[tokio::test]
    async fn test_recent_results_ordering_and_limit() {
        let store = MemoryStore::default();

        for seconds_ago in (0..30).rev() {
            store.append(&outcome_at("http://z", 200, seconds_ago)).await.unwrap();
        }
        store.append(&outcome_at("http://a", 503, 5)).await.unwrap();
        // 乱序写入，查询仍按时间降序
        store.append(&outcome_at("http://a", 200, 1)).await.unwrap();
        store.append(&outcome_at("http://a", 0, 3)).await.unwrap();

        let records = store.recent_results(20).await.unwrap();

        assert_eq!(records.len(), 23);
        assert!(records[..3].iter().all(|r| r.url == "http://a"));
        assert!(records[3..].iter().all(|r| r.url == "http://z"));
        assert_eq!(
            records[..3].iter().map(|r| r.status_code).collect::<Vec<_>>(),
            vec![200, 0, 503]
        );
        for pair in records[3..].windows(2) {
            assert!(pair[0].checked_at >= pair[1].checked_at);
        }
    }

    #[tokio::test]
    async fn test_retention_drops_oldest() {
        let store = MemoryStore::new(3);

        for code in [500, 501, 502, 503] {
            store
                .append(&ProbeOutcome::response("http://a", code, Duration::ZERO))
                .await
                .unwrap();
        }

        let records = store.recent_results(10).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status_code != 500));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("sentinel.json");

        let store = MemoryStore::open(&path, 100).await.unwrap();
        store.add_target("http://a").await.unwrap();
        store.append(&outcome_at("http://a", 503, 2)).await.unwrap();
        store.append(&outcome_at("http://a", 200, 1)).await.unwrap();
        store.flush().await.unwrap();

        let reopened = MemoryStore::open(&path, 100).await.unwrap();
        assert_eq!(reopened.list_targets().await.unwrap(), vec!["http://a".to_string()]);
        let records = reopened.recent_results(20).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status_code, 200);
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sentinel.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = MemoryStore::open(&path, 100).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("解析快照失败"));
    }

    #[tokio::test]
    async fn test_snapshot_with_tmp_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sentinel.tmp");
        assert_eq!(temp_path(&path), dir.path().join("sentinel.tmp.tmp"));

        let store = MemoryStore::open(&path, 100).await.unwrap();
        store.add_target("http://a").await.unwrap();
        store.flush().await.unwrap();

        assert!(!temp_path(&path).exists());
        let reopened = MemoryStore::open(&path, 100).await.unwrap();
        assert_eq!(reopened.list_targets().await.unwrap(), vec!["http://a".to_string()]);
    }

    #[tokio::test]
    async fn test_flush_without_path_is_noop() {
        let store = MemoryStore::default();
        assert!(store.flush().await.is_ok());
        assert!(store.snapshot_path().is_none());
    }
}
