//! 并发探测执行器
//!
//! 每个目标启动一个独立任务（不设并发上限），等待全部完成后统一返回结果

use crate::health::prober::Prober;
use crate::health::result::ProbeOutcome;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error};

/// 对一组目标执行一次 fan-out/fan-in 探测
///
/// 返回的结果与输入目标一一对应（顺序相同），不会丢弃也不会重复。
/// 整体耗时受单次探测超时约束，与目标数量无关。
///
/// # 参数
/// * `prober` - 探测器
/// * `targets` - 本轮目标快照
///
/// # 返回
/// * `Vec<ProbeOutcome>` - 每个目标一个结果
pub async fn run_tick(prober: Arc<dyn Prober>, targets: &[String]) -> Vec<ProbeOutcome> {
    if targets.is_empty() {
        return Vec::new();
    }

    let started = Instant::now();
    debug!("启动 {} 个探测任务", targets.len());

    let handles: Vec<_> = targets
        .iter()
        .map(|url| {
            let prober = Arc::clone(&prober);
            let url = url.clone();
            tokio::spawn(async move { prober.probe(&url).await })
        })
        .collect();

    // fan-in 屏障：所有任务返回之前不进入后续处理
    let joined = futures::future::join_all(handles).await;

    joined
        .into_iter()
        .zip(targets)
        .map(|(joined, url)| match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                // 单个任务崩溃不影响其它目标，仍为该目标产出一个失败结果
                error!("探测任务异常退出 {}: {}", url, e);
                ProbeOutcome::transport_failure(
                    url.clone(),
                    started.elapsed(),
                    format!("Probe task failed: {e}"),
                )
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 固定延迟后返回 200 的探测器
    struct DelayProber {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Prober for DelayProber {
        async fn probe(&self, url: &str) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            ProbeOutcome::response(url, 200, self.delay)
        }

        fn timeout(&self) -> Duration {
            self.delay
        }
    }

    /// 对特定URL直接panic的探测器
    struct PanickingProber;

    #[async_trait]
    impl Prober for PanickingProber {
        async fn probe(&self, url: &str) -> ProbeOutcome {
            if url.contains("boom") {
                panic!("probe exploded");
            }
            ProbeOutcome::response(url, 200, Duration::ZERO)
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://target-{i}.test/")).collect()
    }

    #[tokio::test]
    async fn test_empty_target_set_is_noop() {
        let prober = Arc::new(DelayProber {
            delay: Duration::from_millis(10),
            calls: AtomicUsize::new(0),
        });

        let outcomes = run_tick(prober.clone(), &[]).await;

        assert!(outcomes.is_empty());
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_outcome_per_target() {
        for n in [1, 2, 17] {
            let prober = Arc::new(DelayProber {
                delay: Duration::from_millis(5),
                calls: AtomicUsize::new(0),
            });
            let input = targets(n);

            let outcomes = run_tick(prober.clone(), &input).await;

            assert_eq!(outcomes.len(), n);
            assert_eq!(prober.calls.load(Ordering::SeqCst), n);
            let urls: Vec<_> = outcomes.iter().map(|o| o.url.clone()).collect();
            assert_eq!(urls, input);
            let unique: HashSet<_> = urls.iter().collect();
            assert_eq!(unique.len(), n);
        }
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        let delay = Duration::from_millis(200);
        let prober = Arc::new(DelayProber {
            delay,
            calls: AtomicUsize::new(0),
        });

        let started = std::time::Instant::now();
        let outcomes = run_tick(prober, &targets(50)).await;
        let elapsed = started.elapsed();

        assert_eq!(outcomes.len(), 50);
        // 串行执行需要 10 秒，并发执行应接近单次延迟
        assert!(elapsed < delay * 5, "耗时过长: {elapsed:?}");
    }

    #[tokio::test]
    async fn test_panicking_probe_still_yields_outcome() {
        let input = vec![
            "http://fine.test/".to_string(),
            "http://boom.test/".to_string(),
            "http://also-fine.test/".to_string(),
        ];

        let outcomes = run_tick(Arc::new(PanickingProber), &input).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status_code, 200);
        assert_eq!(outcomes[1].url, "http://boom.test/");
        assert_eq!(outcomes[1].status_code, 0);
        assert_eq!(outcomes[2].status_code, 200);
    }
}
