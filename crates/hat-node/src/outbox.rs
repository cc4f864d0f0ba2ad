//! 出站帧队列
//!
//! 两级优先级：急停帧插队到所有已排队帧之前，其余帧按 FIFO 发送。
//!
//! 两级队列都是固定容量。总线长时间不可用时，普通帧队列满后丢弃最旧的帧；
//! 急停队列满时新的急停帧被丢弃（已有急停帧在等待重试）。

use hat_can::HatFrame;
use heapless::Deque;
use smallvec::SmallVec;
use tracing::trace;

/// 接收批缓冲区
///
/// 栈上预留 32 个位置，与默认 `rx_queue_depth` 一致，正常配置下不会分配堆内存。
pub type FrameBuffer = SmallVec<[HatFrame; 32]>;

/// 普通帧队列容量
pub const OUTBOX_CAPACITY: usize = 32;

/// 急停帧队列容量
pub const EMERGENCY_CAPACITY: usize = 4;

/// 出站优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundPriority {
    /// 急停广播（不可丢弃，发送失败保留重试）
    Emergency,

    /// 应答、遥测、心跳（发送失败即丢弃，下个周期会产生新的）
    Normal,
}

/// 带优先级的出站帧
#[derive(Debug, Clone, Copy)]
pub struct OutboundFrame {
    pub frame: HatFrame,
    pub priority: OutboundPriority,
}

impl OutboundFrame {
    pub fn emergency(frame: HatFrame) -> Self {
        Self {
            frame,
            priority: OutboundPriority::Emergency,
        }
    }

    pub fn normal(frame: HatFrame) -> Self {
        Self {
            frame,
            priority: OutboundPriority::Normal,
        }
    }
}

/// 出站队列
#[derive(Debug, Default)]
pub struct Outbox {
    emergency: Deque<HatFrame, EMERGENCY_CAPACITY>,
    normal: Deque<HatFrame, OUTBOX_CAPACITY>,
    dropped: u64,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队；队列满时按优先级规则丢帧，返回是否丢弃了帧
    pub fn push(&mut self, outbound: OutboundFrame) -> bool {
        match outbound.priority {
            OutboundPriority::Emergency => {
                if self.emergency.push_back(outbound.frame).is_err() {
                    self.dropped += 1;
                    trace!("Emergency queue full, frame 0x{:08X} dropped", outbound.frame.id);
                    return true;
                }
                false
            },
            OutboundPriority::Normal => {
                let mut overflowed = false;
                if self.normal.is_full() {
                    if let Some(oldest) = self.normal.pop_front() {
                        self.dropped += 1;
                        overflowed = true;
                        trace!("Outbox full, oldest frame 0x{:08X} dropped", oldest.id);
                    }
                }
                // 上面已腾出位置
                let _ = self.normal.push_back(outbound.frame);
                overflowed
            },
        }
    }

    /// 取出下一帧（急停帧优先）
    pub fn pop(&mut self) -> Option<OutboundFrame> {
        if let Some(frame) = self.emergency.pop_front() {
            return Some(OutboundFrame::emergency(frame));
        }
        self.normal.pop_front().map(OutboundFrame::normal)
    }

    /// 发送失败的急停帧放回队首
    pub fn requeue_front(&mut self, outbound: OutboundFrame) {
        if outbound.priority == OutboundPriority::Emergency
            && self.emergency.push_front(outbound.frame).is_err()
        {
            self.dropped += 1;
        }
    }

    /// 因队列满而丢弃的帧数
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.emergency.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emergency.is_empty() && self.normal.is_empty()
    }

    pub fn has_emergency(&self) -> bool {
        !self.emergency.is_empty()
    }
}
