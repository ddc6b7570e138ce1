//! 检测调度器模块
//!
//! 以固定间隔驱动检测轮次：读取目标快照、并发探测、顺序记录结果并更新告警状态。
//! 轮次之间不重叠，超时的轮次只会推迟下一轮，不会积压多个待执行轮次。

use crate::health::alert::{AlertStateMachine, AlertTransition, FAILURE_THRESHOLD};
use crate::health::executor;
use crate::health::prober::Prober;
use crate::health::result::ProbeOutcome;
use crate::notification::AlertNotifier;
use crate::store::{ResultSink, TargetStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 默认检测间隔
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// 单轮检测报告
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// 本轮目标数量
    pub targets: usize,
    /// 探测结果
    pub outcomes: Vec<ProbeOutcome>,
    /// 成功写入的结果数
    pub persisted: usize,
    /// 写入失败的结果数
    pub persist_failures: usize,
    /// 产生的告警状态切换
    pub transitions: Vec<AlertTransition>,
    /// 发送失败的通知数
    pub notify_failures: usize,
    /// 是否因读取目标失败而跳过
    pub skipped: bool,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// 本轮是否没有任何目标
    pub fn is_idle(&self) -> bool {
        !self.skipped && self.targets == 0
    }
}

/// 调度器统计信息
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// 执行过探测的轮次
    pub ticks_run: u64,
    /// 没有目标的空闲轮次
    pub idle_ticks: u64,
    /// 读取目标失败而跳过的轮次
    pub skipped_ticks: u64,
    /// 最后一轮的开始时间
    pub last_tick_at: Option<DateTime<Utc>>,
    /// 最后一轮的耗时
    pub last_tick_duration: Option<Duration>,
}

/// 检测调度器
///
/// 独占持有告警状态机，状态更新只发生在 fan-in 之后的顺序处理阶段。
pub struct Scheduler {
    /// 目标存储
    targets: Arc<dyn TargetStore>,
    /// 结果存储
    sink: Arc<dyn ResultSink>,
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 通知器
    notifier: Arc<dyn AlertNotifier>,
    /// 告警状态机
    alerts: AlertStateMachine,
    /// 检测间隔
    interval: Duration,
    /// 统计信息
    stats: SchedulerStats,
}

impl Scheduler {
    /// 创建新的调度器
    ///
    /// # 参数
    /// * `targets` - 目标存储
    /// * `sink` - 结果存储
    /// * `prober` - 探测器
    /// * `notifier` - 通知器
    /// * `interval` - 检测间隔
    pub fn new(
        targets: Arc<dyn TargetStore>,
        sink: Arc<dyn ResultSink>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn AlertNotifier>,
        interval: Duration,
    ) -> Self {
        Self {
            targets,
            sink,
            prober,
            notifier,
            alerts: AlertStateMachine::new(),
            interval,
            stats: SchedulerStats::default(),
        }
    }

    /// 按固定间隔运行，直到收到关闭信号
    ///
    /// 正在执行的轮次总是完整结束后才检查关闭信号。
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        // 超时轮次结束后立即补一轮，之后重新按间隔计时，最多保留一个待执行轮次
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "检测调度器已启动，间隔 {}s，告警阈值 {} 次",
            self.interval.as_secs_f64(),
            FAILURE_THRESHOLD
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("收到关闭信号，检测调度器停止");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
            }
        }
    }

    /// 执行一轮检测
    pub async fn run_tick(&mut self) -> TickReport {
        let started = Instant::now();
        self.stats.last_tick_at = Some(Utc::now());

        let targets = match self.targets.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                error!("获取目标列表失败，跳过本轮: {}", e);
                self.stats.skipped_ticks += 1;
                return TickReport::skipped();
            }
        };

        self.alerts.retain_targets(&targets);

        if targets.is_empty() {
            debug!("😴 没有监控目标，等待中...");
            self.stats.idle_ticks += 1;
            return TickReport::default();
        }

        info!("⚡️ 开始检测: {} 个目标", targets.len());
        let outcomes = executor::run_tick(Arc::clone(&self.prober), &targets).await;

        let mut report = TickReport {
            targets: targets.len(),
            ..TickReport::default()
        };

        for outcome in &outcomes {
            self.process_outcome(outcome, &mut report).await;
        }
        report.outcomes = outcomes;

        let elapsed = started.elapsed();
        self.stats.ticks_run += 1;
        self.stats.last_tick_duration = Some(elapsed);

        if elapsed > self.interval {
            warn!(
                "本轮检测耗时 {}ms，超过检测间隔 {}ms，下一轮将推迟",
                elapsed.as_millis(),
                self.interval.as_millis()
            );
        }
        info!(
            "本轮检测完成: {} 个结果，{} 个状态切换，耗时 {}ms",
            report.outcomes.len(),
            report.transitions.len(),
            elapsed.as_millis()
        );

        report
    }

    /// 记录单个结果并更新告警状态
    async fn process_outcome(&mut self, outcome: &ProbeOutcome, report: &mut TickReport) {
        match self.sink.append(outcome).await {
            Ok(()) => report.persisted += 1,
            Err(e) => {
                // 写入失败不影响告警判定
                error!("写入探测结果失败 {}: {}", outcome.url, e);
                report.persist_failures += 1;
            }
        }

        let transition = self.alerts.observe(outcome);

        if outcome.is_success() {
            debug!("✅ OK: {} ({}ms)", outcome.url, outcome.latency_ms());
        } else {
            let streak = self.alerts.streak(&outcome.url);
            warn!(
                "❌ FAIL [{}/{}]: {}",
                streak.consecutive_failures, FAILURE_THRESHOLD, outcome
            );
        }

        if let Some(transition) = transition {
            if let Err(e) = self.notifier.notify(&transition).await {
                error!(
                    "发送{}通知失败 {} ({}): {}",
                    transition.kind,
                    transition.url,
                    self.notifier.name(),
                    e
                );
                report.notify_failures += 1;
            }
            report.transitions.push(transition);
        }
    }

    /// 获取告警状态机
    pub fn alerts(&self) -> &AlertStateMachine {
        &self.alerts
    }

    /// 获取统计信息
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// 检测间隔
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
