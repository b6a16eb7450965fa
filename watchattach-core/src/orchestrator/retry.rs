//! 重试策略、失败计数与"当前尝试"令牌。

use crate::config::AttachSettings;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-delay retry bounded by a failure ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub polling_interval: Duration,
    pub max_failures: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AttachSettings::default())
    }
}

impl From<&AttachSettings> for RetryPolicy {
    fn from(settings: &AttachSettings) -> Self {
        Self {
            polling_interval: settings.polling_interval,
            max_failures: settings.max_failures,
        }
    }
}

impl RetryPolicy {
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_failures
    }
}

/// 连续 attach 失败计数；跨 attach 周期共享，进程生命周期内有效。
#[derive(Debug, Clone, Default)]
pub struct AttemptState {
    failures: Arc<AtomicU32>,
}

impl AttemptState {
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// 返回递增后的计数
    pub(crate) fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    pub(crate) fn reset(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }
}

/// Issues generation tokens; only the most recently issued token is current.
#[derive(Debug, Clone, Default)]
pub struct AttemptTokens {
    generation: Arc<AtomicU64>,
}

impl AttemptTokens {
    /// 新令牌使之前的全部失效
    pub fn issue(&self) -> AttemptToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        AttemptToken {
            generation,
            current: self.generation.clone(),
        }
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct AttemptToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl AttemptToken {
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}
