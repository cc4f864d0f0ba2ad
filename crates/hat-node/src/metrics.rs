//! 通信统计
//!
//! 计数器使用原子操作，调度线程之外（例如仿真器的状态打印）也可以随时读取快照。
//! `message_count` / `error_count` 单调递增，只有显式的清零指令才会归零。

use std::sync::atomic::{AtomicU64, Ordering};

/// 调度器通信统计
#[derive(Debug, Default)]
pub struct CommStatistics {
    /// 已分发处理的入站帧数
    pub messages: AtomicU64,

    /// 错误数（格式错误帧 + 传输错误）
    pub errors: AtomicU64,

    /// 发送成功的出站帧数
    pub frames_sent: AtomicU64,

    /// 因目的地址 / 回环 / 标准帧被丢弃的入站帧数（不算错误）
    pub frames_filtered: AtomicU64,

    /// 传输错误数（已计入 `errors`）
    pub transport_errors: AtomicU64,
}

impl CommStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.frames_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_filtered: self.frames_filtered.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.messages.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.frames_sent.store(0, Ordering::Relaxed);
        self.frames_filtered.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
    }
}

/// 统计快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatisticsSnapshot {
    pub messages: u64,
    pub errors: u64,
    pub frames_sent: u64,
    pub frames_filtered: u64,
    pub transport_errors: u64,
}

impl StatisticsSnapshot {
    /// 错误率（错误数 / (消息数 + 错误数)）
    pub fn error_rate(&self) -> f64 {
        let total = self.messages + self.errors;
        if total == 0 {
            0.0
        } else {
            self.errors as f64 / total as f64
        }
    }
}

impl std::fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "messages={} errors={} sent={} filtered={} transport_errors={}",
            self.messages,
            self.errors,
            self.frames_sent,
            self.frames_filtered,
            self.transport_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_reset() {
        let stats = CommStatistics::new();
        stats.record_message();
        stats.record_message();
        stats.record_malformed();
        stats.record_transport_error();
        stats.record_sent();
        stats.record_filtered();

        let snap = stats.snapshot();
        assert_eq!(snap.messages, 2);
        assert_eq!(snap.errors, 2);
        assert_eq!(snap.transport_errors, 1);
        assert_eq!(snap.frames_sent, 1);
        assert_eq!(snap.frames_filtered, 1);
        assert_eq!(snap.error_rate(), 0.5);

        stats.reset();
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
        assert_eq!(stats.snapshot().error_rate(), 0.0);
    }

    #[test]
    fn test_display() {
        let stats = CommStatistics::new();
        stats.record_message();
        let text = stats.snapshot().to_string();
        assert!(text.contains("messages=1"));
        assert!(text.contains("errors=0"));
    }
}
