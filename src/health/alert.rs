//! 告警状态机
//!
//! 为每个目标维护连续失败计数，并在状态切换时产出告警/恢复事件。
//! 状态机只在 fan-in 之后被顺序调用，不存在并发写入。

use crate::health::result::ProbeOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// 触发告警所需的连续失败次数
pub const FAILURE_THRESHOLD: u32 = 3;

/// 单个目标的连续失败记录
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureStreak {
    /// 连续失败次数
    pub consecutive_failures: u32,
    /// 是否处于告警中
    pub alerted: bool,
}

/// 目标的告警状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// 健康（初始状态）
    Healthy,
    /// 失败中，尚未达到阈值
    Failing(u32),
    /// 已告警
    Alerted,
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Healthy => write!(f, "正常"),
            AlertState::Failing(n) => write!(f, "失败中({n}/{FAILURE_THRESHOLD})"),
            AlertState::Alerted => write!(f, "告警中"),
        }
    }
}

/// 告警事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// 连续失败达到阈值
    Fired,
    /// 告警后首次成功
    Recovered,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Fired => write!(f, "告警"),
            AlertKind::Recovered => write!(f, "恢复"),
        }
    }
}

/// 告警状态切换事件，只被通知器消费一次，不落盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertTransition {
    /// 事件ID
    pub id: Uuid,
    /// 目标URL
    pub url: String,
    /// 事件类型
    pub kind: AlertKind,
    /// 事件发生时的连续失败次数（恢复事件为恢复前的次数）
    pub consecutive_failures: u32,
    /// 触发事件的状态码
    pub status_code: u16,
    /// 事件时间
    pub occurred_at: DateTime<Utc>,
}

impl AlertTransition {
    fn new(outcome: &ProbeOutcome, kind: AlertKind, consecutive_failures: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: outcome.url.clone(),
            kind,
            consecutive_failures,
            status_code: outcome.status_code,
            occurred_at: outcome.observed_at,
        }
    }
}

/// 告警状态机
///
/// 以显式的状态容器持有所有目标的失败记录，由调度器按所有权持有。
#[derive(Debug, Default)]
pub struct AlertStateMachine {
    streaks: HashMap<String, FailureStreak>,
}

impl AlertStateMachine {
    /// 创建空的状态机，所有目标初始为健康
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一个探测结果
    ///
    /// # 参数
    /// * `outcome` - 探测结果
    ///
    /// # 返回
    /// * `Option<AlertTransition>` - 如果发生状态切换则返回事件
    pub fn observe(&mut self, outcome: &ProbeOutcome) -> Option<AlertTransition> {
        let streak = self.streaks.entry(outcome.url.clone()).or_default();

        if outcome.is_success() {
            let previous_failures = streak.consecutive_failures;
            let was_alerted = streak.alerted;
            *streak = FailureStreak::default();

            return was_alerted
                .then(|| AlertTransition::new(outcome, AlertKind::Recovered, previous_failures));
        }

        streak.consecutive_failures = streak.consecutive_failures.saturating_add(1);

        // 只在恰好达到阈值时告警一次，之后的失败不再重复告警
        if streak.consecutive_failures == FAILURE_THRESHOLD && !streak.alerted {
            streak.alerted = true;
            return Some(AlertTransition::new(
                outcome,
                AlertKind::Fired,
                streak.consecutive_failures,
            ));
        }

        None
    }

    /// 获取目标当前状态
    pub fn state(&self, url: &str) -> AlertState {
        match self.streaks.get(url) {
            None => AlertState::Healthy,
            Some(streak) if streak.alerted => AlertState::Alerted,
            Some(streak) if streak.consecutive_failures == 0 => AlertState::Healthy,
            Some(streak) => AlertState::Failing(streak.consecutive_failures),
        }
    }

    /// 获取目标的失败记录
    pub fn streak(&self, url: &str) -> FailureStreak {
        self.streaks.get(url).copied().unwrap_or_default()
    }

    /// 丢弃已不在目标快照中的失败记录
    ///
    /// 被删除后重新添加的目标从健康状态重新开始。
    pub fn retain_targets(&mut self, targets: &[String]) {
        let current: HashSet<&str> = targets.iter().map(String::as_str).collect();
        self.streaks.retain(|url, _| current.contains(url.as_str()));
    }

    /// 当前处于告警中的目标数量
    pub fn alerted_count(&self) -> usize {
        self.streaks.values().filter(|s| s.alerted).count()
    }

    /// 被跟踪的目标数量
    pub fn tracked_count(&self) -> usize {
        self.streaks.len()
    }
}
