//! 节点层错误类型定义

use hat_can::CanError;
use hat_protocol::{NodeState, ProtocolError, ResultCode};
use thiserror::Error;

/// 状态切换守卫失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardReason {
    /// 状态转换表中没有这条边
    NotPermitted,
    /// 有强制组件不在线（或未使能）
    MandatoryNotReady { address: u16 },
    /// 组件表尚未初始化
    RegistryNotInitialized,
    /// 复位令牌缺失或不匹配
    NotAuthenticated,
    /// 急停锁定期间拒绝组件操作
    EstopLatched,
}

impl GuardReason {
    /// STATE_RESPONSE 附加信息字段
    ///
    /// 强制组件未就绪时带组件地址，其余为原因编号（高位置 1 以区别于地址）。
    pub fn detail(self) -> u16 {
        match self {
            GuardReason::MandatoryNotReady { address } => address,
            GuardReason::NotPermitted => 0x8001,
            GuardReason::RegistryNotInitialized => 0x8002,
            GuardReason::NotAuthenticated => 0x8003,
            GuardReason::EstopLatched => 0x8004,
        }
    }
}

impl std::fmt::Display for GuardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardReason::NotPermitted => f.write_str("transition not permitted"),
            GuardReason::MandatoryNotReady { address } => {
                write!(f, "mandatory component 0x{:04X} not ready", address)
            },
            GuardReason::RegistryNotInitialized => f.write_str("registry not initialized"),
            GuardReason::NotAuthenticated => f.write_str("reset token missing or invalid"),
            GuardReason::EstopLatched => f.write_str("emergency stop latched"),
        }
    }
}

/// 节点层错误类型
#[derive(Error, Debug)]
pub enum HatError {
    /// 组件地址不存在
    #[error("Component address 0x{address:04X} not found")]
    AddressNotFound { address: u16 },

    /// 配置超出组件类型允许的范围
    #[error("Invalid config for component 0x{address:04X}: {reason}")]
    InvalidConfig { address: u16, reason: &'static str },

    /// CAN 传输错误
    #[error("CAN transport error: {0}")]
    Transport(#[from] CanError),

    /// 帧格式错误
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] ProtocolError),

    /// 状态切换守卫失败
    #[error("Transition {from} -> {to} refused: {reason}")]
    GuardFailed {
        from: NodeState,
        to: NodeState,
        reason: GuardReason,
    },

    /// 组件硬件故障
    #[error("Component 0x{address:04X} fault (code 0x{code:02X})")]
    ComponentFault { address: u16, code: u8 },

    /// 初始化探测到的组件数量不足
    #[error("Discovery incomplete: expected {expected} components, found {found}")]
    DiscoveryIncomplete { expected: usize, found: usize },

    /// 硬件映射中有重复地址
    #[error("Duplicate component address 0x{address:04X}")]
    DuplicateAddress { address: u16 },

    /// 组件数量超过上限
    #[error("Too many components: {count} (max {max})")]
    CapacityExceeded { count: usize, max: usize },
}

impl HatError {
    /// 映射为 STATE_RESPONSE 结果码
    pub fn result_code(&self) -> ResultCode {
        match self {
            HatError::AddressNotFound { .. } => ResultCode::AddressNotFound,
            HatError::InvalidConfig { .. } => ResultCode::InvalidConfig,
            HatError::Transport(_) => ResultCode::TransportError,
            HatError::MalformedFrame(_) => ResultCode::MalformedFrame,
            HatError::GuardFailed { .. } => ResultCode::GuardFailed,
            HatError::ComponentFault { .. } => ResultCode::ComponentFault,
            HatError::DiscoveryIncomplete { .. }
            | HatError::DuplicateAddress { .. }
            | HatError::CapacityExceeded { .. } => ResultCode::InvalidConfig,
        }
    }

    /// STATE_RESPONSE 附加信息字段
    pub fn detail(&self) -> u16 {
        match self {
            HatError::AddressNotFound { address }
            | HatError::InvalidConfig { address, .. }
            | HatError::ComponentFault { address, .. }
            | HatError::DuplicateAddress { address } => *address,
            HatError::GuardFailed { reason, .. } => reason.detail(),
            _ => 0,
        }
    }
}
