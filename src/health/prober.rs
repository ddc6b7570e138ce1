//! HTTP探测器实现
//!
//! 对单个URL执行有超时上限的 GET 请求，并返回结构化的探测结果

use crate::error::{Result, SentinelError};
use crate::health::result::ProbeOutcome;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as _;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// 默认探测超时时间
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 探测器trait，定义单次探测接口
///
/// 实现必须保证：
/// - 无论成功失败都返回一个结果，不返回错误
/// - 耗时不超过自身的超时上限
/// - 内部不重试
#[async_trait]
pub trait Prober: Send + Sync {
    /// 探测单个URL
    ///
    /// # 参数
    /// * `url` - 目标URL
    ///
    /// # 返回
    /// * `ProbeOutcome` - 探测结果
    async fn probe(&self, url: &str) -> ProbeOutcome;

    /// 探测超时上限
    fn timeout(&self) -> Duration;
}

/// 基于 reqwest 的HTTP探测器
pub struct HttpProber {
    /// HTTP客户端
    client: Client,
    /// 超时时间
    timeout: Duration,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `timeout` - 单次探测的超时时间
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| SentinelError::Other(anyhow::anyhow!("创建HTTP客户端失败: {e}")))?;

        Ok(Self { client, timeout })
    }

    /// 格式化请求错误信息，使其更加清晰易读
    fn format_request_error(error: &reqwest::Error) -> String {
        if error.is_timeout() {
            return "Request timeout".to_string();
        }

        // reqwest 把DNS失败也归类为连接错误，需要展开错误链区分
        let mut details = error.to_string();
        let mut source = error.source();
        while let Some(inner) = source {
            details.push_str(": ");
            details.push_str(&inner.to_string());
            source = inner.source();
        }
        let lowered = details.to_lowercase();

        if lowered.contains("dns") || lowered.contains("failed to lookup") {
            "DNS resolution failed".to_string()
        } else if lowered.contains("certificate")
            || lowered.contains("tls")
            || lowered.contains("ssl")
        {
            "SSL/TLS certificate error".to_string()
        } else if error.is_connect() {
            "Connection refused".to_string()
        } else if error.is_request() || error.is_builder() {
            "Invalid request".to_string()
        } else {
            format!("Request failed: {details}")
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start_time = Instant::now();

        // 客户端自身已配置超时，这里再套一层作为硬上限
        let response_result = timeout(self.timeout, self.client.get(url).send()).await;

        let latency = start_time.elapsed();

        match response_result {
            // send() 在收到响应头后返回，响应体不读取
            Ok(Ok(response)) => ProbeOutcome::response(url, response.status().as_u16(), latency),
            Ok(Err(e)) => ProbeOutcome::transport_failure(url, latency, Self::format_request_error(&e)),
            Err(_) => ProbeOutcome::transport_failure(url, latency, "Request timeout"),
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
