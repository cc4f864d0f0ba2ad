//! 监控器脚本
//!
//! TOML 描述的监控器操作序列，在内存总线上驱动一个 `HatNode`，
//! 并把节点的应答解析成可读的日志。

use anyhow::{Context, Result, bail};
use hat_can::{HatFrame, MockCanAdapter};
use hat_node::{
    Clock, EmergencyReason, HatConfig, HatNode, ManualClock, NodeState, StatisticsSnapshot,
};
use hat_protocol::{
    CanIdentifier, ComponentConfig, ConfigCommand, ControlCommand, EmergencyCommand,
    HeartbeatFrame, MessageCategory, StateCommand, StateResponseFrame, StatusRequest,
    TelemetryFrame,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::hardware::SimulatedHardware;

/// 脚本中的节点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptState {
    Init,
    Idle,
    Running,
    Safe,
    Estop,
}

impl From<ScriptState> for NodeState {
    fn from(state: ScriptState) -> Self {
        match state {
            ScriptState::Init => NodeState::Init,
            ScriptState::Idle => NodeState::Idle,
            ScriptState::Running => NodeState::Running,
            ScriptState::Safe => NodeState::Safe,
            ScriptState::Estop => NodeState::Estop,
        }
    }
}

/// 脚本步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    /// 推进仿真时间（期间按周期调度节点）
    Wait { ms: u64 },

    /// 监控器心跳
    Heartbeat,

    /// 状态切换请求（复位到 init 时带令牌）
    State {
        target: ScriptState,
        #[serde(default)]
        token: Option<u16>,
    },

    SetState { address: u16, state: u8 },
    Enable { address: u16 },
    Disable { address: u16 },
    Calibrate { address: u16 },
    SelfTest { address: u16 },
    ResetComponent { address: u16 },
    ResetStatistics,

    Configure {
        address: u16,
        mode: u8,
        #[serde(default)]
        parameter: Option<i32>,
    },

    /// 状态查询（不带地址为全部组件）
    Status {
        #[serde(default)]
        address: Option<u16>,
    },

    /// 广播急停
    Emergency {
        #[serde(default)]
        reason: Option<u8>,
    },

    /// 组件停止 / 恢复上报
    Silence {
        address: u16,
        #[serde(default = "default_true")]
        silent: bool,
    },

    /// 注入 / 清除组件故障
    Fault {
        address: u16,
        #[serde(default = "default_true")]
        active: bool,
    },

    /// 断言节点当前状态
    Expect { state: ScriptState },
}

fn default_true() -> bool {
    true
}

/// 监控器脚本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// 监控器是否在等待期间自动发送心跳
    #[serde(default = "default_true")]
    pub auto_heartbeat: bool,

    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("解析脚本 TOML 失败")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取脚本文件失败: {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// 执行结果
#[derive(Debug, Clone)]
pub struct ScriptReport {
    pub total_steps: usize,
    /// (步骤序号, 失败原因)
    pub failed: Vec<(usize, String)>,
    /// 节点发出的应答中 nack 的数量
    pub nacks: usize,
    pub final_state: NodeState,
    pub statistics: StatisticsSnapshot,
    pub elapsed_ms: u64,
}

/// 脚本执行器
///
/// 节点、总线和时钟都在进程内，监控器一侧直接向 mock 总线注入帧。
pub struct ScriptRunner {
    node: HatNode<MockCanAdapter, SimulatedHardware, ManualClock>,
    bus: MockCanAdapter,
    clock: ManualClock,
    node_address: u8,
    supervisor_address: u8,
    tick_period_ms: u64,
    heartbeat_period_ms: u64,
    continue_on_error: bool,
    nacks: usize,
}

impl ScriptRunner {
    pub fn new(config: HatConfig, hardware: SimulatedHardware) -> Result<Self> {
        let bus = MockCanAdapter::new();
        let clock = ManualClock::new(0);
        let node_address = config.node_address;
        let supervisor_address = config.supervisor_address;
        let tick_period_ms = config.tick_period_ms;
        let heartbeat_period_ms = config.heartbeat_period_ms;

        let mut node = HatNode::new(config, bus.clone(), hardware, clock.clone())
            .context("节点配置无效")?;
        if let Err(e) = node.initialize() {
            // 组件探测不完整时节点停在 INIT，脚本仍然可以观察它的行为
            warn!("Node initialization incomplete: {}", e);
        }

        Ok(Self {
            node,
            bus,
            clock,
            node_address,
            supervisor_address,
            tick_period_ms,
            heartbeat_period_ms,
            continue_on_error: false,
            nacks: 0,
        })
    }

    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn node(&self) -> &HatNode<MockCanAdapter, SimulatedHardware, ManualClock> {
        &self.node
    }

    pub fn run(&mut self, script: &Script) -> Result<ScriptReport> {
        info!("Running script '{}' ({} steps)", script.name, script.steps.len());
        let started = self.clock.now_ms();

        // 先跑一个周期，让节点完成 INIT -> IDLE
        self.cycle(script.auto_heartbeat);

        let mut failed = Vec::new();
        for (idx, step) in script.steps.iter().enumerate() {
            info!("[{}] {:?}", idx + 1, step);
            if let Err(e) = self.execute(step, script.auto_heartbeat) {
                warn!("[{}] failed: {:#}", idx + 1, e);
                failed.push((idx, format!("{:#}", e)));
                if !self.continue_on_error {
                    break;
                }
            }
        }

        Ok(ScriptReport {
            total_steps: script.steps.len(),
            failed,
            nacks: self.nacks,
            final_state: self.node.state(),
            statistics: self.node.statistics(),
            elapsed_ms: self.clock.now_ms() - started,
        })
    }

    fn execute(&mut self, step: &ScriptStep, auto_heartbeat: bool) -> Result<()> {
        let (node, sup) = (self.node_address, self.supervisor_address);
        match *step {
            ScriptStep::Wait { ms } => {
                let end = self.clock.now_ms() + ms;
                while self.clock.now_ms() < end {
                    let delta = self.tick_period_ms.min(end - self.clock.now_ms());
                    self.clock.advance(delta);
                    self.cycle(auto_heartbeat);
                }
                return Ok(());
            },
            ScriptStep::Heartbeat => self.send(self.supervisor_heartbeat()),
            ScriptStep::State { target, token } => self.send(
                StateCommand {
                    target: target.into(),
                    token,
                }
                .to_frame(sup, node),
            ),
            ScriptStep::SetState { address, state } => {
                self.send(ControlCommand::SetState { address, state }.to_frame(sup, node))
            },
            ScriptStep::Enable { address } => {
                self.send(ControlCommand::Enable { address }.to_frame(sup, node))
            },
            ScriptStep::Disable { address } => {
                self.send(ControlCommand::Disable { address }.to_frame(sup, node))
            },
            ScriptStep::Calibrate { address } => {
                self.send(ControlCommand::Calibrate { address }.to_frame(sup, node))
            },
            ScriptStep::SelfTest { address } => {
                self.send(ControlCommand::SelfTest { address }.to_frame(sup, node))
            },
            ScriptStep::ResetComponent { address } => {
                self.send(ControlCommand::ResetComponent { address }.to_frame(sup, node))
            },
            ScriptStep::ResetStatistics => {
                self.send(ControlCommand::ResetStatistics.to_frame(sup, node))
            },
            ScriptStep::Configure {
                address,
                mode,
                parameter,
            } => {
                let config = ComponentConfig { mode, parameter };
                self.send(ConfigCommand::new(address, config).to_frame(sup, node))
            },
            ScriptStep::Status { address } => {
                let request = address.map_or(StatusRequest::All, StatusRequest::Component);
                self.send(request.to_frame(sup, node))
            },
            ScriptStep::Emergency { reason } => {
                let reason = reason.map_or(EmergencyReason::Operator, EmergencyReason::from);
                self.send(EmergencyCommand::new(reason).to_broadcast(sup))
            },
            ScriptStep::Silence { address, silent } => {
                let hardware = self.node.registry_mut().hardware_mut();
                if !hardware.set_silenced(address, silent) {
                    bail!("组件 0x{:04X} 不存在", address);
                }
                return Ok(());
            },
            ScriptStep::Fault { address, active } => {
                let hardware = self.node.registry_mut().hardware_mut();
                if !hardware.set_faulted(address, active) {
                    bail!("组件 0x{:04X} 不存在", address);
                }
                return Ok(());
            },
            ScriptStep::Expect { state } => {
                let expected = NodeState::from(state);
                let actual = self.node.state();
                if actual != expected {
                    bail!("期望状态 {}，实际状态 {}", expected, actual);
                }
                return Ok(());
            },
        }

        self.node.process_messages();
        self.drain_outbound();
        Ok(())
    }

    fn supervisor_heartbeat(&self) -> HatFrame {
        HeartbeatFrame::new(NodeState::Running, 0)
            .to_frame(self.supervisor_address, self.node_address)
    }

    fn send(&self, frame: HatFrame) {
        self.bus.queue_frame(frame);
    }

    /// 一个调度周期：按需发送监控器心跳，处理入站帧，执行周期任务
    fn cycle(&mut self, auto_heartbeat: bool) {
        let now = self.clock.now_ms();
        if auto_heartbeat && now % self.heartbeat_period_ms < self.tick_period_ms {
            self.send(self.supervisor_heartbeat());
        }
        self.node.process_messages();
        self.node.tick();
        self.drain_outbound();
    }

    /// 解析节点发出的帧并记录
    fn drain_outbound(&mut self) {
        for frame in self.bus.take_sent() {
            let id = CanIdentifier::from_raw(frame.id);
            let payload = frame.data_slice();
            match id.category() {
                MessageCategory::StateResponse => match StateResponseFrame::decode(payload) {
                    Ok(response) if response.reply_to.is_none() => {
                        info!("  <- state changed: {}", response.state);
                    },
                    Ok(response) if response.is_ack() => info!(
                        "  <- ack {:?} (state {}, detail 0x{:04X})",
                        response.reply_to, response.state, response.detail
                    ),
                    Ok(response) => {
                        self.nacks += 1;
                        warn!(
                            "  <- nack {:?}: {:?} (state {}, detail 0x{:04X})",
                            response.reply_to, response.result, response.state, response.detail
                        );
                    },
                    Err(e) => warn!("  <- undecodable state response: {}", e),
                },
                MessageCategory::Telemetry => {
                    if let Ok(t) = TelemetryFrame::decode(payload) {
                        info!(
                            "  <- telemetry 0x{:04X}: value={:.2} error=0x{:02X}",
                            t.address, t.value, t.error_code
                        );
                    }
                },
                MessageCategory::Emergency => {
                    warn!("  <- EMERGENCY broadcast {:02X?}", payload);
                },
                // 心跳太频繁，只在 trace 级别由节点自己记录
                _ => {},
            }
        }
    }
}
