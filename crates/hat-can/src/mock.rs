//! 内存 mock 适配器
//!
//! 克隆出的句柄共享同一组队列：测试代码保留一个句柄注入帧、检查发送记录，
//! 另一个句柄交给调度器。

use crate::{AcceptanceFilter, CanAdapter, CanError, HatFrame};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
struct MockState {
    receive_queue: VecDeque<HatFrame>,
    sent_frames: Vec<HatFrame>,
    filters: Vec<AcceptanceFilter>,
    send_errors: VecDeque<CanError>,
    receive_errors: VecDeque<CanError>,
    recover_calls: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockCanAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockCanAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注入一帧到接收队列（不经过过滤器检查，过滤在 `receive` 时进行）
    pub fn queue_frame(&self, frame: HatFrame) {
        self.state.lock().receive_queue.push_back(frame);
    }

    pub fn queue_frames(&self, frames: impl IntoIterator<Item = HatFrame>) {
        self.state.lock().receive_queue.extend(frames);
    }

    /// 下一次 `send` 返回该错误
    pub fn fail_next_send(&self, error: CanError) {
        self.state.lock().send_errors.push_back(error);
    }

    /// 下一次 `receive` 返回该错误
    pub fn fail_next_receive(&self, error: CanError) {
        self.state.lock().receive_errors.push_back(error);
    }

    pub fn sent_frames(&self) -> Vec<HatFrame> {
        self.state.lock().sent_frames.clone()
    }

    /// 取出并清空发送记录
    pub fn take_sent(&self) -> Vec<HatFrame> {
        std::mem::take(&mut self.state.lock().sent_frames)
    }

    pub fn pending_rx(&self) -> usize {
        self.state.lock().receive_queue.len()
    }

    pub fn filters(&self) -> Vec<AcceptanceFilter> {
        self.state.lock().filters.clone()
    }

    pub fn recover_calls(&self) -> usize {
        self.state.lock().recover_calls
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: HatFrame) -> Result<(), CanError> {
        let mut state = self.state.lock();
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }
        trace!("mock TX: ID=0x{:08X}, len={}", frame.id, frame.len);
        state.sent_frames.push(frame);
        Ok(())
    }

    fn receive(&mut self) -> Result<HatFrame, CanError> {
        let mut state = self.state.lock();
        if let Some(err) = state.receive_errors.pop_front() {
            return Err(err);
        }

        // 模拟硬件过滤：不匹配的帧直接丢弃
        while let Some(frame) = state.receive_queue.pop_front() {
            if !frame.is_extended || AcceptanceFilter::any_matches(&state.filters, frame.id) {
                return Ok(frame);
            }
            trace!("mock RX filtered: ID=0x{:08X}", frame.id);
        }
        Err(CanError::Timeout)
    }

    fn configure_filters(&mut self, filters: &[AcceptanceFilter]) -> Result<(), CanError> {
        self.state.lock().filters = filters.to_vec();
        Ok(())
    }

    fn recover(&mut self) -> Result<(), CanError> {
        self.state.lock().recover_calls += 1;
        Ok(())
    }
}
