//! 集成测试公共设施
//!
//! 模拟组件硬件 + mock 总线 + 手动时钟，模拟监控器收发帧。

#![allow(dead_code)]

use hat_can::{HatFrame, MockCanAdapter};
use hat_node::{
    Clock, ComponentKind, ComponentSpec, HardwareDriver, HardwareFault, HatConfig, HatNode,
    ManualClock, NodeState,
};
use hat_protocol::{
    CanIdentifier, ComponentConfig, ConfigCommand, ControlCommand, EmergencyCommand,
    EmergencyReason, HeartbeatFrame, MessageCategory, StateCommand, StateResponseFrame,
    StatusRequest,
};
use std::collections::{HashMap, HashSet};

pub const NODE: u8 = 0x10;
pub const SUPERVISOR: u8 = 0x00;
pub const TOKEN: u16 = 0xA5C3;

/// 模拟组件硬件
#[derive(Debug, Default)]
pub struct TestHardware {
    pub absent: HashSet<u16>,
    pub faulty: HashSet<u16>,
    pub readings: HashMap<u16, f32>,
    pub safe_outputs: Vec<u16>,
    pub applied_configs: Vec<(u16, ComponentConfig)>,
}

impl TestHardware {
    fn check(&self, address: u16, code: u8) -> Result<(), HardwareFault> {
        if self.faulty.contains(&address) {
            Err(HardwareFault(code))
        } else {
            Ok(())
        }
    }
}

impl HardwareDriver for TestHardware {
    fn probe(&mut self, address: u16, _kind: ComponentKind) -> bool {
        !self.absent.contains(&address)
    }

    fn apply_state(&mut self, address: u16, _state: u8) -> Result<(), HardwareFault> {
        self.check(address, 0x01)
    }

    fn apply_config(
        &mut self,
        address: u16,
        config: &ComponentConfig,
    ) -> Result<(), HardwareFault> {
        self.check(address, 0x02)?;
        self.applied_configs.push((address, *config));
        Ok(())
    }

    fn force_safe_output(&mut self, address: u16) -> Result<(), HardwareFault> {
        self.safe_outputs.push(address);
        self.check(address, 0x03)
    }

    fn poll(&mut self, address: u16) -> Option<f32> {
        self.readings.get(&address).copied()
    }
}

pub fn default_components() -> Vec<ComponentSpec> {
    vec![
        ComponentSpec::new(0x10, ComponentKind::Sensor)
            .mandatory()
            .named("imu"),
        ComponentSpec::new(0x20, ComponentKind::Actuator)
            .mandatory()
            .named("drive"),
        ComponentSpec::new(0x30, ComponentKind::Indicator)
            .safe_mode_exempt()
            .named("status-led"),
    ]
}

pub fn test_config() -> HatConfig {
    HatConfig {
        supervisor_timeout_ms: 0,
        ..HatConfig::default()
    }
    .with_components(default_components())
}

pub type TestNode = HatNode<MockCanAdapter, TestHardware, ManualClock>;

pub struct Harness {
    pub bus: MockCanAdapter,
    pub clock: ManualClock,
    pub node: TestNode,
}

impl Harness {
    pub fn new(config: HatConfig) -> Self {
        let bus = MockCanAdapter::new();
        let clock = ManualClock::new(0);
        let mut node = HatNode::new(config, bus.clone(), TestHardware::default(), clock.clone())
            .expect("valid config");
        node.initialize().expect("node initializes");
        Self { bus, clock, node }
    }

    /// 初始化并完成 INIT -> IDLE，清空发送记录
    pub fn idle() -> Self {
        let mut harness = Self::new(test_config());
        harness.node.tick();
        assert_eq!(harness.node.state(), NodeState::Idle);
        harness.bus.take_sent();
        harness
    }

    /// 强制组件上报在线并使能后进入 RUNNING
    pub fn running() -> Self {
        let mut harness = Self::idle();
        harness.make_mandatory_ready();
        harness.send(StateCommand::request(NodeState::Running).to_frame(SUPERVISOR, NODE));
        harness.process();
        assert_eq!(harness.node.state(), NodeState::Running);
        harness.bus.take_sent();
        harness
    }

    pub fn make_mandatory_ready(&mut self) {
        let now = self.clock.now_ms();
        let registry = self.node.registry_mut();
        for address in [0x10, 0x20] {
            registry.record_update(address, 1.0, true, now).unwrap();
            registry.enable(address).unwrap();
        }
    }

    pub fn send(&self, frame: HatFrame) {
        self.bus.queue_frame(frame);
    }

    pub fn process(&mut self) -> usize {
        self.node.process_messages()
    }

    pub fn advance(&mut self, ms: u64) {
        self.clock.advance(ms);
    }

    pub fn control(&mut self, cmd: ControlCommand) -> StateResponseFrame {
        self.send(cmd.to_frame(SUPERVISOR, NODE));
        self.process();
        self.single_response()
    }

    pub fn configure(&mut self, address: u16, config: ComponentConfig) -> StateResponseFrame {
        self.send(ConfigCommand::new(address, config).to_frame(SUPERVISOR, NODE));
        self.process();
        self.single_response()
    }

    pub fn state_command(&mut self, cmd: StateCommand) -> StateResponseFrame {
        self.send(cmd.to_frame(SUPERVISOR, NODE));
        self.process();
        self.single_response()
    }

    pub fn status_request(&mut self, req: StatusRequest) -> Vec<HatFrame> {
        self.send(req.to_frame(SUPERVISOR, NODE));
        self.process();
        self.bus.take_sent()
    }

    pub fn emergency(&self, reason: EmergencyReason) {
        self.send(EmergencyCommand::new(reason).to_broadcast(SUPERVISOR));
    }

    pub fn supervisor_heartbeat(&self) {
        self.send(HeartbeatFrame::new(NodeState::Running, 0).to_frame(SUPERVISOR, NODE));
    }

    /// 取出唯一一个发出的帧并解析为 STATE_RESPONSE
    pub fn single_response(&self) -> StateResponseFrame {
        let sent = self.bus.take_sent();
        assert_eq!(sent.len(), 1, "expected exactly one reply, got {:?}", sent);
        assert_eq!(category(&sent[0]), MessageCategory::StateResponse);
        StateResponseFrame::decode(sent[0].data_slice()).unwrap()
    }
}

pub fn category(frame: &HatFrame) -> MessageCategory {
    CanIdentifier::from_raw(frame.id).category()
}

pub fn source(frame: &HatFrame) -> u8 {
    CanIdentifier::from_raw(frame.id).source()
}

pub fn destination(frame: &HatFrame) -> u8 {
    CanIdentifier::from_raw(frame.id).destination()
}
