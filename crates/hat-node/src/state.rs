//! # 节点状态机
//!
//! | From | To | Guard |
//! |---|---|---|
//! | INIT | IDLE | 组件表已初始化 |
//! | IDLE | RUNNING | 所有强制组件在线且已使能 |
//! | RUNNING | IDLE | 无 |
//! | 非 ESTOP | SAFE | 无 |
//! | SAFE | IDLE | 所有强制组件在线 |
//! | 任意 | ESTOP | 无 |
//! | ESTOP | INIT | 复位令牌匹配 |
//!
//! ESTOP 只能通过带令牌的复位指令退出，没有任何超时或在线恢复路径。
//! 进入 SAFE / ESTOP 时的组件清扫在切换内同步完成。

use crate::error::{GuardReason, HatError};
use crate::hardware::HardwareDriver;
use crate::registry::ComponentRegistry;
use hat_protocol::NodeState;
use tracing::{error, info, warn};

/// 一次已提交的状态切换
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: NodeState,
    pub to: NodeState,
    /// 切换过程中被强制停止的组件数
    pub stopped: usize,
}

impl Transition {
    fn noop(state: NodeState) -> Self {
        Self {
            from: state,
            to: state,
            stopped: 0,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    pub fn entered(&self, state: NodeState) -> bool {
        !self.is_noop() && self.to == state
    }
}

/// 节点状态机
#[derive(Debug, Clone)]
pub struct NodeStateMachine {
    state: NodeState,
    reset_token: u16,
    entered_at_ms: u64,
    transition_count: u64,
}

impl NodeStateMachine {
    pub fn new(reset_token: u16) -> Self {
        Self {
            state: NodeState::Init,
            reset_token,
            entered_at_ms: 0,
            transition_count: 0,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// 进入当前状态的时间
    pub fn entered_at_ms(&self) -> u64 {
        self.entered_at_ms
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// 转换表中是否存在这条边（不检查守卫）
    pub fn is_permitted(from: NodeState, to: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (from, to),
            (Init, Idle)
                | (Idle, Running)
                | (Running, Idle)
                | (Init | Idle | Running, Safe)
                | (Safe, Idle)
                | (_, Estop)
                | (Estop, Init)
        ) || from == to
    }

    /// 请求切换到 `target`
    ///
    /// 请求当前状态是无副作用的成功。`token` 只在 ESTOP → INIT 时检查。
    pub fn request<H: HardwareDriver>(
        &mut self,
        target: NodeState,
        token: Option<u16>,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) -> Result<Transition, HatError> {
        let from = self.state;
        if from == target {
            return Ok(Transition::noop(from));
        }

        let refuse = |reason: GuardReason| {
            warn!("Transition {} -> {} refused: {}", from, target, reason);
            HatError::GuardFailed {
                from,
                to: target,
                reason,
            }
        };

        if !Self::is_permitted(from, target) {
            return Err(refuse(GuardReason::NotPermitted));
        }

        match (from, target) {
            (NodeState::Init, NodeState::Idle) if !registry.is_initialized() => {
                return Err(refuse(GuardReason::RegistryNotInitialized));
            },
            (NodeState::Idle, NodeState::Running) => {
                if let Err(address) = registry.check_mandatory(now_ms, true) {
                    return Err(refuse(GuardReason::MandatoryNotReady { address }));
                }
            },
            (NodeState::Safe, NodeState::Idle) => {
                if let Err(address) = registry.check_mandatory(now_ms, false) {
                    return Err(refuse(GuardReason::MandatoryNotReady { address }));
                }
            },
            (NodeState::Estop, NodeState::Init) if token != Some(self.reset_token) => {
                return Err(refuse(GuardReason::NotAuthenticated));
            },
            _ => {},
        }

        let stopped = match target {
            NodeState::Safe => registry.enter_safe_mode(),
            NodeState::Estop => registry.emergency_stop(),
            NodeState::Init => {
                registry.reset_all_components();
                0
            },
            _ => 0,
        };

        Ok(self.commit(target, stopped, now_ms))
    }

    /// 急停（任意状态，不会失败）
    pub fn emergency_stop<H: HardwareDriver>(
        &mut self,
        registry: &mut ComponentRegistry<H>,
        now_ms: u64,
    ) -> Transition {
        if self.state == NodeState::Estop {
            return Transition::noop(NodeState::Estop);
        }
        let stopped = registry.emergency_stop();
        self.commit(NodeState::Estop, stopped, now_ms)
    }

    /// 周期评估：完成初始化，以及在线丢失 / 监控器超时时强制进入 SAFE
    pub fn evaluate<H: HardwareDriver>(
        &mut self,
        registry: &mut ComponentRegistry<H>,
        supervisor_alive: bool,
        now_ms: u64,
    ) -> Option<Transition> {
        match self.state {
            NodeState::Init if registry.is_initialized() => {
                Some(self.commit(NodeState::Idle, 0, now_ms))
            },
            NodeState::Idle | NodeState::Running => {
                if let Some(address) = registry.mandatory_liveness_lost(now_ms) {
                    warn!("Mandatory component 0x{:04X} lost liveness", address);
                } else if !supervisor_alive {
                    warn!("Supervisor heartbeat lost");
                } else {
                    return None;
                }
                let stopped = registry.enter_safe_mode();
                Some(self.commit(NodeState::Safe, stopped, now_ms))
            },
            _ => None,
        }
    }

    fn commit(&mut self, to: NodeState, stopped: usize, now_ms: u64) -> Transition {
        let from = self.state;
        self.state = to;
        self.entered_at_ms = now_ms;
        self.transition_count += 1;

        if to == NodeState::Estop {
            error!("Node state {} -> ESTOP ({} component(s) stopped)", from, stopped);
        } else {
            info!("Node state {} -> {}", from, to);
        }

        Transition { from, to, stopped }
    }
}
