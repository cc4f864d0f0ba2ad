//! # CAN 调度器
//!
//! 负责接收过滤、按类别路由、出站帧组装（心跳 / 遥测 / 状态应答 / 急停广播）、
//! 通信统计以及心跳计时。
//!
//! 每个处理周期：
//!
//! ```text
//! try_receive × rx_queue_depth ─→ 地址过滤 ─→ 解码 ─→ EMERGENCY 优先 ─→ 其余按到达顺序
//!                                                                        │
//!                                          flush(outbox, 急停帧优先) ←───┘
//! ```
//!
//! 调度器持有传输句柄和统计，状态机和组件表以 `&mut` 借用的方式逐次传入。

use crate::config::HatConfig;
use crate::error::{GuardReason, HatError};
use crate::hardware::HardwareDriver;
use crate::metrics::{CommStatistics, StatisticsSnapshot};
use crate::outbox::{FrameBuffer, OutboundFrame, Outbox};
use crate::registry::{ComponentRegistry, ComponentStatus};
use crate::state::{NodeStateMachine, Transition};
use hat_can::{AcceptanceFilter, CanAdapter, CanError, HatFrame};
use hat_protocol::{
    BROADCAST_ADDRESS, ConfigCommand, ControlCommand, Direction, EmergencyCommand,
    EmergencyReason, HatMessage, HeartbeatFrame, Inbound, MessageCategory, NodeState,
    StateCommand, StateResponseFrame, StatusRequest, TelemetryFrame,
};
use smallvec::SmallVec;
use tracing::{debug, error, trace, warn};

/// 已解码、待分发的入站消息
type DecodedBatch = SmallVec<[(HatMessage, Inbound); 32]>;

/// CAN 调度器
pub struct CanDispatcher<A: CanAdapter> {
    adapter: A,
    node_address: u8,
    supervisor_address: u8,
    rx_queue_depth: usize,
    heartbeat_period_ms: u64,
    supervisor_timeout_ms: u64,
    last_heartbeat_ms: Option<u64>,
    last_supervisor_ms: u64,
    outbox: Outbox,
    stats: CommStatistics,
    initialized: bool,
    /// 设备消失 / 权限不足，重试无意义
    transport_lost: bool,
}

impl<A: CanAdapter> CanDispatcher<A> {
    pub fn new(adapter: A, config: &HatConfig) -> Self {
        Self {
            adapter,
            node_address: config.node_address,
            supervisor_address: config.supervisor_address,
            rx_queue_depth: config.rx_queue_depth,
            heartbeat_period_ms: config.heartbeat_period_ms,
            supervisor_timeout_ms: config.supervisor_timeout_ms,
            last_heartbeat_ms: None,
            last_supervisor_ms: 0,
            outbox: Outbox::new(),
            stats: CommStatistics::new(),
            initialized: false,
            transport_lost: false,
        }
    }

    /// 安装接收过滤器、清零统计、开始监控器心跳计时
    pub fn initialize(&mut self, now_ms: u64) -> Result<(), HatError> {
        let filters = [
            AcceptanceFilter::for_destination(self.node_address),
            AcceptanceFilter::for_destination(BROADCAST_ADDRESS),
        ];
        self.adapter.configure_filters(&filters).map_err(|e| {
            error!("Failed to configure CAN filters: {}", e);
            HatError::Transport(e)
        })?;

        self.stats.reset();
        self.last_supervisor_ms = now_ms;
        self.last_heartbeat_ms = None;
        self.initialized = true;
        debug!(
            "CAN dispatcher initialized: node=0x{:02X}, supervisor=0x{:02X}",
            self.node_address, self.supervisor_address
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 是否遇到过不可恢复的传输错误
    pub fn transport_lost(&self) -> bool {
        self.transport_lost
    }

    pub fn node_address(&self) -> u8 {
        self.node_address
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    // ------------------------------------------------------------------
    // 过滤与收发
    // ------------------------------------------------------------------

    /// 目的地址为本节点或广播，且不是本节点自己发出的回环帧
    pub fn is_message_for_this_hat(&self, message: &HatMessage) -> bool {
        message.identifier.source() != self.node_address
            && message.is_addressed_to(self.node_address)
    }

    /// 非阻塞接收一帧
    pub fn receive_message(&mut self) -> Result<Option<HatFrame>, HatError> {
        match self.adapter.try_receive() {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.handle_transport_error(&e);
                Err(HatError::Transport(e))
            },
        }
    }

    /// 直接发送一帧（不经过出站队列）
    pub fn send_message(&mut self, frame: HatFrame) -> Result<(), HatError> {
        self.log_frame(&frame, Direction::Outbound);
        match self.adapter.send(frame) {
            Ok(()) => {
                self.stats.record_sent();
                Ok(())
            },
            Err(e) => {
                self.handle_transport_error(&e);
                Err(HatError::Transport(e))
            },
        }
    }

    /// 逐帧跟踪日志
    pub fn log_frame(&self, frame: &HatFrame, direction: Direction) {
        match frame.identifier() {
            Ok(id) => trace!(
                "{} {:?} 0x{:02X}->0x{:02X} id=0x{:08X} data={:02X?}",
                direction,
                id.category(),
                id.source(),
                id.destination(),
                frame.id,
                frame.data_slice()
            ),
            Err(_) => trace!(
                "{} standard id=0x{:03X} data={:02X?}",
                direction,
                frame.id,
                frame.data_slice()
            ),
        }
    }

    fn handle_transport_error(&mut self, err: &CanError) {
        self.stats.record_transport_error();
        error!("CAN transport error: {}", err);
        if err.is_fatal() {
            self.transport_lost = true;
            return;
        }
        if let Err(e) = self.adapter.recover() {
            error!("CAN transport recovery failed: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // 处理周期
    // ------------------------------------------------------------------

    /// 排空接收队列并分发，返回分发的消息数
    ///
    /// 同一批次中的 EMERGENCY 帧先于其他帧处理；格式错误帧计入错误数后丢弃。
    /// 不会失败。
    pub fn process_messages<H: HardwareDriver>(
        &mut self,
        state: &mut NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) -> usize {
        let mut batch = FrameBuffer::new();
        while batch.len() < self.rx_queue_depth {
            match self.adapter.try_receive() {
                Ok(Some(frame)) => batch.push(frame),
                Ok(None) => break,
                Err(e) => {
                    self.handle_transport_error(&e);
                    break;
                },
            }
        }

        let mut decoded = DecodedBatch::new();
        for frame in batch {
            self.log_frame(&frame, Direction::Inbound);

            let message = match HatMessage::new(frame, Direction::Inbound) {
                Ok(message) => message,
                Err(_) => {
                    // 标准帧不属于本协议
                    self.stats.record_filtered();
                    continue;
                },
            };
            if !self.is_message_for_this_hat(&message) {
                self.stats.record_filtered();
                continue;
            }

            match Inbound::decode(&message) {
                Ok(inbound) => decoded.push((message, inbound)),
                Err(e) => {
                    self.stats.record_malformed();
                    warn!(
                        "Dropping malformed frame from 0x{:02X}: {}",
                        message.identifier.source(),
                        e
                    );
                },
            }
        }

        let mut dispatched = 0;
        let emergency_first = decoded
            .iter()
            .filter(|(m, _)| m.category() == MessageCategory::Emergency)
            .chain(
                decoded
                    .iter()
                    .filter(|(m, _)| m.category() != MessageCategory::Emergency),
            );
        for (message, inbound) in emergency_first {
            self.stats.record_message();
            self.dispatch(message, *inbound, state, registry, now_ms);
            dispatched += 1;
        }

        self.flush();
        dispatched
    }

    /// 周期任务：组件轮询、状态评估、心跳
    pub fn tick<H: HardwareDriver>(
        &mut self,
        state: &mut NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) -> Option<Transition> {
        registry.poll_components(now_ms);

        let transition = state.evaluate(registry, self.supervisor_alive(now_ms), now_ms);
        if let Some(t) = transition {
            self.queue(StateResponseFrame::unsolicited(t.to).to_frame(
                self.node_address,
                self.supervisor_address,
            ));
        }

        let due = self
            .last_heartbeat_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.heartbeat_period_ms);
        if due {
            let heartbeat = HeartbeatFrame::new(state.state(), registry.responding_bitmap(now_ms));
            let frame = heartbeat
                .to_frame(self.node_address, BROADCAST_ADDRESS)
                .with_timestamp(now_ms * 1000);
            self.queue(frame);
            self.last_heartbeat_ms = Some(now_ms);
        }

        self.flush();
        transition
    }

    /// 监控器是否在线（`supervisor_timeout_ms == 0` 时视为始终在线）
    pub fn supervisor_alive(&self, now_ms: u64) -> bool {
        self.supervisor_timeout_ms == 0
            || now_ms.saturating_sub(self.last_supervisor_ms) <= self.supervisor_timeout_ms
    }

    fn queue(&mut self, frame: HatFrame) {
        if self.outbox.push(OutboundFrame::normal(frame)) {
            debug!("Outbox full, dropped oldest outbound frame");
        }
    }

    fn queue_emergency(&mut self, reason: EmergencyReason) {
        let frame = EmergencyCommand::new(reason).to_broadcast(self.node_address);
        if self.outbox.push(OutboundFrame::emergency(frame)) {
            warn!("Emergency broadcast already pending, {:?} not queued", reason);
        }
    }

    /// 发送出站队列；急停帧发送失败时保留到下个周期重试
    fn flush(&mut self) {
        while let Some(outbound) = self.outbox.pop() {
            self.log_frame(&outbound.frame, Direction::Outbound);
            match self.adapter.send(outbound.frame) {
                Ok(()) => self.stats.record_sent(),
                Err(e) => {
                    self.handle_transport_error(&e);
                    self.outbox.requeue_front(outbound);
                    if self.outbox.has_emergency() {
                        break;
                    }
                },
            }
        }
    }

    // ------------------------------------------------------------------
    // 路由
    // ------------------------------------------------------------------

    fn dispatch<H: HardwareDriver>(
        &mut self,
        message: &HatMessage,
        inbound: Inbound,
        state: &mut NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) {
        let source = message.identifier.source();
        match inbound {
            Inbound::Emergency(cmd) => self.handle_emergency(cmd, source, state, registry, now_ms),
            Inbound::StateCommand(cmd) => {
                self.handle_state_command(cmd, source, state, registry, now_ms)
            },
            Inbound::Control(cmd) => self.handle_control(cmd, source, state, registry),
            Inbound::Config(cmd) => self.handle_config(cmd, source, state, registry),
            Inbound::StatusRequest(req) => {
                self.handle_status_request(req, source, state, registry, now_ms)
            },
            Inbound::Heartbeat(hb) => {
                if source == self.supervisor_address {
                    self.last_supervisor_ms = now_ms;
                    trace!("Supervisor heartbeat (state {})", hb.state);
                } else {
                    trace!("Peer 0x{:02X} heartbeat ignored", source);
                }
            },
            Inbound::StateResponse(_) | Inbound::Telemetry(_) => {
                trace!("{:?} from 0x{:02X} ignored", inbound.category(), source);
            },
        }
    }

    fn reply(&mut self, destination: u8, response: StateResponseFrame) {
        self.queue(response.to_frame(self.node_address, destination));
    }

    fn reply_result(
        &mut self,
        destination: u8,
        node_state: NodeState,
        category: MessageCategory,
        result: Result<u16, HatError>,
    ) {
        let response = match result {
            Ok(detail) => StateResponseFrame::ack(node_state, category, detail),
            Err(e) => {
                warn!("{:?} from 0x{:02X} rejected: {}", category, destination, e);
                StateResponseFrame::nack(node_state, category, e.result_code(), e.detail())
            },
        };
        self.reply(destination, response);
    }

    fn handle_emergency<H: HardwareDriver>(
        &mut self,
        cmd: EmergencyCommand,
        source: u8,
        state: &mut NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) {
        error!("EMERGENCY from 0x{:02X} ({:?})", source, cmd.reason);
        let transition = state.emergency_stop(registry, now_ms);
        if transition.entered(NodeState::Estop) {
            self.queue_emergency(cmd.reason);
        }
    }

    fn handle_state_command<H: HardwareDriver>(
        &mut self,
        cmd: StateCommand,
        source: u8,
        state: &mut NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) {
        debug!("STATE_COMMAND from 0x{:02X}: -> {}", source, cmd.target);
        let result = state.request(cmd.target, cmd.token, registry, now_ms);
        if let Ok(t) = &result {
            if t.entered(NodeState::Estop) {
                self.queue_emergency(EmergencyReason::Operator);
            }
        }
        let result = result.map(|_| cmd.target as u16);
        self.reply_result(source, state.state(), MessageCategory::StateCommand, result);
    }

    fn handle_control<H: HardwareDriver>(
        &mut self,
        cmd: ControlCommand,
        source: u8,
        state: &NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
    ) {
        debug!("CONTROL from 0x{:02X}: {:?}", source, cmd);
        let node_state = state.state();

        let result = if node_state == NodeState::Estop && cmd.mutates_outputs() {
            Err(Self::estop_latched(node_state))
        } else {
            match cmd {
                ControlCommand::SetState { address, state: value } => {
                    registry.set_state(address, value)
                },
                ControlCommand::Enable { address } => registry.enable(address),
                ControlCommand::Disable { address } => registry.disable(address),
                ControlCommand::Calibrate { address } => registry.calibrate(address),
                ControlCommand::SelfTest { address } => registry.test(address),
                ControlCommand::ResetComponent { address } => registry.reset_component(address),
                ControlCommand::ResetStatistics => {
                    self.reset_statistics();
                    Ok(())
                },
            }
        };

        let result = result.map(|()| cmd.address().unwrap_or_default());
        self.reply_result(source, node_state, MessageCategory::Control, result);
    }

    fn handle_config<H: HardwareDriver>(
        &mut self,
        cmd: ConfigCommand,
        source: u8,
        state: &NodeStateMachine,
        registry: &mut ComponentRegistry<H>,
    ) {
        debug!("CONFIG from 0x{:02X}: {:?}", source, cmd);
        let node_state = state.state();

        let result = if node_state == NodeState::Estop {
            Err(Self::estop_latched(node_state))
        } else {
            registry.configure(cmd.address, &cmd.config)
        };

        let result = result.map(|()| cmd.address);
        self.reply_result(source, node_state, MessageCategory::Config, result);
    }

    fn handle_status_request<H: HardwareDriver>(
        &mut self,
        req: StatusRequest,
        source: u8,
        state: &NodeStateMachine,
        registry: &ComponentRegistry<H>,
        now_ms: u64,
    ) {
        debug!("STATUS_REQUEST from 0x{:02X}: {:?}", source, req);
        let node_state = state.state();

        match req {
            StatusRequest::All => {
                let count = registry.component_count() as u16;
                self.reply(
                    source,
                    StateResponseFrame::ack(node_state, MessageCategory::StatusRequest, count),
                );
                for status in registry.statuses(now_ms) {
                    self.queue_telemetry(&status, source, now_ms);
                }
            },
            StatusRequest::Component(address) => match registry.status(address, now_ms) {
                Ok(status) => {
                    let category = MessageCategory::StatusRequest;
                    self.reply(source, StateResponseFrame::ack(node_state, category, address));
                    self.queue_telemetry(&status, source, now_ms);
                },
                Err(e) => {
                    self.reply_result(source, node_state, MessageCategory::StatusRequest, Err(e));
                },
            },
        }
    }

    fn estop_latched(node_state: NodeState) -> HatError {
        HatError::GuardFailed {
            from: node_state,
            to: node_state,
            reason: GuardReason::EstopLatched,
        }
    }

    fn queue_telemetry(&mut self, status: &ComponentStatus, destination: u8, now_ms: u64) {
        let frame = TelemetryFrame::new(status.address, status.value, status.error_code)
            .to_frame(self.node_address, destination)
            .with_timestamp(now_ms * 1000);
        self.queue(frame);
    }

    // ------------------------------------------------------------------
    // 出站（直接发送）
    // ------------------------------------------------------------------

    /// 发送心跳（状态 + 组件在线位图）
    pub fn send_heartbeat(
        &mut self,
        node_state: NodeState,
        responding_bitmap: u32,
        now_ms: u64,
    ) -> Result<(), HatError> {
        let frame = HeartbeatFrame::new(node_state, responding_bitmap)
            .to_frame(self.node_address, BROADCAST_ADDRESS)
            .with_timestamp(now_ms * 1000);
        self.last_heartbeat_ms = Some(now_ms);
        self.send_message(frame)
    }

    /// 发送单个组件遥测到监控器
    pub fn send_telemetry(
        &mut self,
        status: &ComponentStatus,
        now_ms: u64,
    ) -> Result<(), HatError> {
        let frame = TelemetryFrame::new(status.address, status.value, status.error_code)
            .to_frame(self.node_address, self.supervisor_address)
            .with_timestamp(now_ms * 1000);
        self.send_message(frame)
    }

    /// 向监控器回显当前状态
    pub fn send_state_response(&mut self, node_state: NodeState) -> Result<(), HatError> {
        let frame = StateResponseFrame::unsolicited(node_state)
            .to_frame(self.node_address, self.supervisor_address);
        self.send_message(frame)
    }

    /// 广播急停（插队到所有已排队帧之前并立即发送）
    pub fn send_emergency_stop(&mut self, reason: EmergencyReason) {
        self.queue_emergency(reason);
        self.flush();
    }

    /// 出站队列中尚未发出的帧数
    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    /// 出站队列满时丢弃的帧数
    pub fn dropped_outbound(&self) -> u64 {
        self.outbox.dropped()
    }

    // ------------------------------------------------------------------
    // 统计
    // ------------------------------------------------------------------

    pub fn message_count(&self) -> u64 {
        self.stats.message_count()
    }

    pub fn error_count(&self) -> u64 {
        self.stats.error_count()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&mut self) {
        self.stats.reset();
        debug!("Communication statistics reset");
    }
}
