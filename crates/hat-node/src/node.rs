//! `HatNode` 聚合体
//!
//! 持有调度器、状态机、组件表和时钟，每次调用时把后两者借给调度器。

use crate::clock::Clock;
use crate::config::{ConfigError, HatConfig};
use crate::dispatcher::CanDispatcher;
use crate::error::HatError;
use crate::hardware::HardwareDriver;
use crate::metrics::StatisticsSnapshot;
use crate::registry::ComponentRegistry;
use crate::state::{NodeStateMachine, Transition};
use hat_can::CanAdapter;
use hat_protocol::{EmergencyReason, NodeState};
use tracing::{error, info};

pub struct HatNode<A: CanAdapter, H: HardwareDriver, C: Clock> {
    config: HatConfig,
    dispatcher: CanDispatcher<A>,
    state: NodeStateMachine,
    registry: ComponentRegistry<H>,
    clock: C,
}

impl<A: CanAdapter, H: HardwareDriver, C: Clock> HatNode<A, H, C> {
    /// 校验配置并组装节点（不访问总线和硬件）
    pub fn new(config: HatConfig, adapter: A, hardware: H, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dispatcher: CanDispatcher::new(adapter, &config),
            state: NodeStateMachine::new(config.reset_token),
            registry: ComponentRegistry::new(hardware, config.liveness_timeout_ms),
            clock,
            config,
        })
    }

    /// 初始化传输和组件表
    ///
    /// 先初始化传输，组件探测失败时总线仍可用（节点停留在 INIT，心跳照常发送）。
    pub fn initialize(&mut self) -> Result<(), HatError> {
        let now = self.clock.now_ms();
        self.dispatcher.initialize(now)?;
        let found = self.registry.initialize(&self.config.components)?;
        info!(
            "HAT node 0x{:02X} initialized with {} component(s)",
            self.config.node_address, found
        );
        Ok(())
    }

    /// 处理一批入站帧，返回分发的消息数
    pub fn process_messages(&mut self) -> usize {
        let now = self.clock.now_ms();
        self.dispatcher
            .process_messages(&mut self.state, &mut self.registry, now)
    }

    /// 周期任务（组件轮询、状态评估、心跳）
    pub fn tick(&mut self) -> Option<Transition> {
        let now = self.clock.now_ms();
        self.dispatcher.tick(&mut self.state, &mut self.registry, now)
    }

    /// 本地检测到故障：进入 ESTOP 并广播急停
    pub fn report_local_fault(&mut self, reason: EmergencyReason) -> Transition {
        let now = self.clock.now_ms();
        error!("Local fault reported: {:?}", reason);
        let transition = self.state.emergency_stop(&mut self.registry, now);
        if transition.entered(NodeState::Estop) {
            self.dispatcher.send_emergency_stop(reason);
        }
        transition
    }

    /// 本地发起状态切换（与 STATE_COMMAND 走同一套守卫）
    pub fn request_state(
        &mut self,
        target: NodeState,
        token: Option<u16>,
    ) -> Result<Transition, HatError> {
        let now = self.clock.now_ms();
        let transition = self
            .state
            .request(target, token, &mut self.registry, now)?;
        if transition.entered(NodeState::Estop) {
            self.dispatcher.send_emergency_stop(EmergencyReason::LocalFault);
        }
        Ok(transition)
    }

    pub fn state(&self) -> NodeState {
        self.state.state()
    }

    pub fn state_machine(&self) -> &NodeStateMachine {
        &self.state
    }

    pub fn registry(&self) -> &ComponentRegistry<H> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry<H> {
        &mut self.registry
    }

    pub fn dispatcher(&self) -> &CanDispatcher<A> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut CanDispatcher<A> {
        &mut self.dispatcher
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.dispatcher.statistics()
    }

    pub fn config(&self) -> &HatConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
