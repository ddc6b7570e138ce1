//! 探测结果数据结构
//!
//! 定义单次探测的结果类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 传输层失败时使用的状态码（超时、拒绝连接、DNS失败等）
pub const TRANSPORT_FAILURE: u16 = 0;

/// 视为成功的唯一状态码
///
/// 只有 `200` 算作成功，其它 2xx（例如 `204`）在告警判定中同样视为失败。
/// 该策略为兼容既有的告警行为而保留，不要悄悄放宽为 "2xx 均成功"。
pub const SUCCESS_STATUS: u16 = 200;

/// 单次探测结果
///
/// 结果一经生成即不可变，fan-in 之后依次交给结果记录器和告警状态机。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 目标URL
    pub url: String,
    /// HTTP状态码，`0` 表示传输层失败
    pub status_code: u16,
    /// 从请求开始到收到完整响应头的耗时（失败时为失败前的耗时）
    #[serde(rename = "latency_ms", with = "duration_serde")]
    pub latency: Duration,
    /// 探测完成时间
    pub observed_at: DateTime<Utc>,
    /// 传输层错误描述（如果有）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// 创建收到HTTP响应的探测结果
    pub fn response(url: impl Into<String>, status_code: u16, latency: Duration) -> Self {
        Self {
            url: url.into(),
            status_code,
            latency,
            observed_at: Utc::now(),
            error_message: None,
        }
    }

    /// 创建传输层失败的探测结果
    pub fn transport_failure(
        url: impl Into<String>,
        latency: Duration,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status_code: TRANSPORT_FAILURE,
            latency,
            observed_at: Utc::now(),
            error_message: Some(error_message.into()),
        }
    }

    /// 是否为成功结果（仅 `200`）
    pub fn is_success(&self) -> bool {
        self.status_code == SUCCESS_STATUS
    }

    /// 是否为传输层失败
    pub fn is_transport_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE
    }

    /// 获取延迟（毫秒）
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_transport_failure() {
            write!(
                f,
                "{} 不可达 ({}ms, {})",
                self.url,
                self.latency_ms(),
                self.error_message.as_deref().unwrap_or("N/A")
            )
        } else {
            write!(f, "{} HTTP {} ({}ms)", self.url, self.status_code, self.latency_ms())
        }
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_200_is_success() {
        assert!(ProbeOutcome::response("http://a", 200, Duration::ZERO).is_success());

        for code in [201, 204, 301, 404, 500, 503] {
            let outcome = ProbeOutcome::response("http://a", code, Duration::ZERO);
            assert!(!outcome.is_success(), "{code} 不应视为成功");
        }
    }

    #[test]
    fn test_transport_failure_outcome() {
        let outcome =
            ProbeOutcome::transport_failure("http://a", Duration::from_millis(42), "Connection refused");

        assert_eq!(outcome.status_code, 0);
        assert!(outcome.is_transport_failure());
        assert!(!outcome.is_success());
        assert_eq!(outcome.latency_ms(), 42);
        assert_eq!(outcome.error_message.as_deref(), Some("Connection refused"));
    }

    #[test]
    fn test_outcome_serializes_latency_in_millis() {
        let outcome = ProbeOutcome::response("http://a", 503, Duration::from_millis(1500));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["latency_ms"], 1500);
        assert_eq!(json["status_code"], 503);
        assert!(json.get("error_message").is_none());
    }

    #[test]
    fn test_display() {
        let ok = ProbeOutcome::response("http://a", 200, Duration::from_millis(12));
        assert_eq!(ok.to_string(), "http://a HTTP 200 (12ms)");

        let down = ProbeOutcome::transport_failure("http://b", Duration::from_millis(5), "DNS resolution failed");
        assert!(down.to_string().contains("不可达"));
    }
}
