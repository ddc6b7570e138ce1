//! 启动阶段的后端存储连接
//!
//! 有限次数重试并指数退避，全部失败时视为致命错误

use crate::error::{Result, StoreError};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// 退避间隔上限
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// 计算第 `attempt` 次失败后的等待时间（从1开始）
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// 重试连接后端存储
///
/// # 参数
/// * `attempts` - 最大尝试次数（至少1次）
/// * `base_delay` - 首次重试前的等待时间，之后每次翻倍
/// * `connect` - 连接函数
///
/// # 返回
/// * `Result<T>` - 连接成功的存储，或 `StoreError::Unavailable`
pub async fn connect_with_retry<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut connect: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match connect().await {
            Ok(store) => {
                if attempt > 1 {
                    info!("后端存储在第 {} 次尝试时连接成功", attempt);
                }
                return Ok(store);
            }
            Err(e) => {
                last_error = e.to_string();
                warn!("后端存储未就绪，重试中... ({}/{}): {}", attempt, attempts, e);
            }
        }

        if attempt < attempts {
            tokio::time::sleep(retry_delay(base_delay, attempt)).await;
        }
    }

    Err(StoreError::Unavailable {
        attempts,
        reason: last_error,
    }
    .into())
}
