//! 入站指令帧结构体定义
//!
//! 包含 CONTROL / STATUS_REQUEST / STATE_COMMAND / EMERGENCY 四类指令，
//! 提供从载荷解析的方法和（监控器侧使用的）转换为 `HatFrame` 的方法。

use crate::feedback::NodeState;
use crate::ids::{BROADCAST_ADDRESS, CanIdentifier, MessageCategory};
use crate::{EMERGENCY_LEN, HatFrame, ProtocolError, bytes_to_u16_be};

// ============================================================================
// 组件控制指令 (CONTROL)
// ============================================================================

/// 控制操作码（CONTROL Byte 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum ControlOp {
    /// 设置组件状态（带 1 字节参数）
    SetState = 0x01,
    /// 使能组件
    Enable = 0x02,
    /// 失能组件
    Disable = 0x03,
    /// 校准组件
    Calibrate = 0x04,
    /// 组件自检
    SelfTest = 0x05,
    /// 复位组件
    ResetComponent = 0x06,
    /// 清零通信统计（不带组件地址）
    ResetStatistics = 0x10,
}

/// 组件控制指令
///
/// 载荷布局：
/// - Byte 0: 操作码
/// - Byte 1-2: 组件地址（`ResetStatistics` 无此字段）
/// - Byte 3: 参数（仅 `SetState`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetState { address: u16, state: u8 },
    Enable { address: u16 },
    Disable { address: u16 },
    Calibrate { address: u16 },
    SelfTest { address: u16 },
    ResetComponent { address: u16 },
    ResetStatistics,
}

impl ControlCommand {
    /// 目标组件地址
    pub fn address(&self) -> Option<u16> {
        match *self {
            ControlCommand::SetState { address, .. }
            | ControlCommand::Enable { address }
            | ControlCommand::Disable { address }
            | ControlCommand::Calibrate { address }
            | ControlCommand::SelfTest { address }
            | ControlCommand::ResetComponent { address } => Some(address),
            ControlCommand::ResetStatistics => None,
        }
    }

    pub fn op(&self) -> ControlOp {
        match self {
            ControlCommand::SetState { .. } => ControlOp::SetState,
            ControlCommand::Enable { .. } => ControlOp::Enable,
            ControlCommand::Disable { .. } => ControlOp::Disable,
            ControlCommand::Calibrate { .. } => ControlOp::Calibrate,
            ControlCommand::SelfTest { .. } => ControlOp::SelfTest,
            ControlCommand::ResetComponent { .. } => ControlOp::ResetComponent,
            ControlCommand::ResetStatistics => ControlOp::ResetStatistics,
        }
    }

    /// 是否会改变组件输出（急停期间拒绝）
    pub fn mutates_outputs(&self) -> bool {
        !matches!(
            self,
            ControlCommand::Disable { .. } | ControlCommand::ResetStatistics
        )
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let invalid_length = || ProtocolError::InvalidLength {
            category: MessageCategory::Control,
            actual: payload.len(),
        };

        let (&op_byte, rest) = payload.split_first().ok_or_else(invalid_length)?;
        let op = ControlOp::try_from(op_byte).map_err(|_| ProtocolError::InvalidValue {
            field: "ControlOp",
            value: op_byte,
        })?;

        let expected_len = match op {
            ControlOp::ResetStatistics => 1,
            ControlOp::SetState => 4,
            _ => 3,
        };
        if payload.len() != expected_len {
            return Err(invalid_length());
        }

        if op == ControlOp::ResetStatistics {
            return Ok(ControlCommand::ResetStatistics);
        }

        let address = bytes_to_u16_be([rest[0], rest[1]]);
        Ok(match op {
            ControlOp::SetState => ControlCommand::SetState {
                address,
                state: rest[2],
            },
            ControlOp::Enable => ControlCommand::Enable { address },
            ControlOp::Disable => ControlCommand::Disable { address },
            ControlOp::Calibrate => ControlCommand::Calibrate { address },
            ControlOp::SelfTest => ControlCommand::SelfTest { address },
            ControlOp::ResetComponent => ControlCommand::ResetComponent { address },
            ControlOp::ResetStatistics => ControlCommand::ResetStatistics,
        })
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let mut data = [0u8; 4];
        data[0] = self.op() as u8;
        let len = match self {
            ControlCommand::ResetStatistics => 1,
            ControlCommand::SetState { address, state } => {
                data[1..3].copy_from_slice(&address.to_be_bytes());
                data[3] = state;
                4
            },
            other => {
                let address = other.address().unwrap_or_default();
                data[1..3].copy_from_slice(&address.to_be_bytes());
                3
            },
        };

        let id = CanIdentifier::compose(source, destination, MessageCategory::Control);
        HatFrame::new_extended(id.to_raw(), &data[..len])
    }
}

// ============================================================================
// 状态查询 (STATUS_REQUEST)
// ============================================================================

/// 状态查询
///
/// 空载荷查询全部组件，2 字节载荷查询单个组件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRequest {
    All,
    Component(u16),
}

impl StatusRequest {
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        match payload {
            [] => Ok(StatusRequest::All),
            [hi, lo] => Ok(StatusRequest::Component(bytes_to_u16_be([*hi, *lo]))),
            _ => Err(ProtocolError::InvalidLength {
                category: MessageCategory::StatusRequest,
                actual: payload.len(),
            }),
        }
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let id = CanIdentifier::compose(source, destination, MessageCategory::StatusRequest);
        match self {
            StatusRequest::All => HatFrame::new_extended(id.to_raw(), &[]),
            StatusRequest::Component(address) => {
                HatFrame::new_extended(id.to_raw(), &address.to_be_bytes())
            },
        }
    }
}

// ============================================================================
// 节点状态切换指令 (STATE_COMMAND)
// ============================================================================

/// 节点状态切换指令
///
/// - Byte 0: 目标状态
/// - Byte 1-2: 操作员令牌（可选；复位到 INIT 时必须携带）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateCommand {
    pub target: NodeState,
    pub token: Option<u16>,
}

impl StateCommand {
    /// 普通状态切换请求
    pub fn request(target: NodeState) -> Self {
        Self {
            target,
            token: None,
        }
    }

    /// 急停复位请求（ESTOP → INIT）
    pub fn reset(token: u16) -> Self {
        Self {
            target: NodeState::Init,
            token: Some(token),
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let token = match payload.len() {
            1 => None,
            3 => Some(bytes_to_u16_be([payload[1], payload[2]])),
            actual => {
                return Err(ProtocolError::InvalidLength {
                    category: MessageCategory::StateCommand,
                    actual,
                });
            },
        };

        Ok(Self {
            target: NodeState::from_wire(payload[0])?,
            token,
        })
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let id = CanIdentifier::compose(source, destination, MessageCategory::StateCommand);
        match self.token {
            None => HatFrame::new_extended(id.to_raw(), &[self.target as u8]),
            Some(token) => {
                let [hi, lo] = token.to_be_bytes();
                HatFrame::new_extended(id.to_raw(), &[self.target as u8, hi, lo])
            },
        }
    }
}

// ============================================================================
// 急停 (EMERGENCY)
// ============================================================================

/// 急停原因码
///
/// 未知原因码统一映射为 `Unspecified`，不影响急停生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum EmergencyReason {
    #[num_enum(default)]
    Unspecified = 0x00,
    /// 操作员 / 监控器下发
    Operator = 0x01,
    /// 本节点检测到的本地故障
    LocalFault = 0x02,
    /// 组件硬件故障
    ComponentFault = 0x03,
    /// 看门狗超时
    WatchdogTimeout = 0x04,
}

/// 急停指令 / 广播
///
/// 急停帧宁可多停：没有原因字节或带多余字节都照样生效（原因取 Byte 0）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmergencyCommand {
    pub reason: EmergencyReason,
}

impl EmergencyCommand {
    pub fn new(reason: EmergencyReason) -> Self {
        Self { reason }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let reason = payload
            .first()
            .map_or(EmergencyReason::Unspecified, |&b| EmergencyReason::from(b));
        Ok(Self { reason })
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let id = CanIdentifier::compose(source, destination, MessageCategory::Emergency);
        let data: [u8; EMERGENCY_LEN] = [self.reason.into()];
        HatFrame::new_extended(id.to_raw(), &data)
    }

    /// 广播急停帧
    pub fn to_broadcast(self, source: u8) -> HatFrame {
        self.to_frame(source, BROADCAST_ADDRESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_decode_set_state() {
        let cmd = ControlCommand::decode(&[0x01, 0x00, 0x20, 0x07]).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::SetState {
                address: 0x0020,
                state: 0x07
            }
        );
        assert_eq!(cmd.address(), Some(0x0020));
    }

    #[test]
    fn test_control_decode_enable_disable() {
        assert_eq!(
            ControlCommand::decode(&[0x02, 0x00, 0x10]).unwrap(),
            ControlCommand::Enable { address: 0x10 }
        );
        assert_eq!(
            ControlCommand::decode(&[0x03, 0x01, 0x00]).unwrap(),
            ControlCommand::Disable { address: 0x100 }
        );
    }

    #[test]
    fn test_control_decode_reset_statistics() {
        let cmd = ControlCommand::decode(&[0x10]).unwrap();
        assert_eq!(cmd, ControlCommand::ResetStatistics);
        assert_eq!(cmd.address(), None);
        assert!(!cmd.mutates_outputs());
    }

    #[test]
    fn test_control_decode_rejects_bad_length_and_op() {
        // SetState 缺参数
        assert!(matches!(
            ControlCommand::decode(&[0x01, 0x00, 0x20]),
            Err(ProtocolError::InvalidLength { .. })
        ));
        // Enable 多一个字节
        assert!(ControlCommand::decode(&[0x02, 0x00, 0x20, 0x00]).is_err());
        // 空载荷
        assert!(ControlCommand::decode(&[]).is_err());
        // 未知操作码
        assert_eq!(
            ControlCommand::decode(&[0x7F, 0x00, 0x20]),
            Err(ProtocolError::InvalidValue {
                field: "ControlOp",
                value: 0x7F
            })
        );
    }

    #[test]
    fn test_control_to_frame_layout() {
        let frame = ControlCommand::SetState {
            address: 0x0120,
            state: 0x02,
        }
        .to_frame(0x00, 0x10);
        assert_eq!(frame.data_slice(), &[0x01, 0x01, 0x20, 0x02]);
        assert_eq!(
            frame.identifier().unwrap().category(),
            MessageCategory::Control
        );

        let frame = ControlCommand::Calibrate { address: 0x30 }.to_frame(0x00, 0x10);
        assert_eq!(frame.data_slice(), &[0x04, 0x00, 0x30]);

        let frame = ControlCommand::ResetStatistics.to_frame(0x00, 0x10);
        assert_eq!(frame.data_slice(), &[0x10]);
    }

    #[test]
    fn test_status_request_decode() {
        assert_eq!(StatusRequest::decode(&[]).unwrap(), StatusRequest::All);
        assert_eq!(
            StatusRequest::decode(&[0x00, 0x20]).unwrap(),
            StatusRequest::Component(0x20)
        );
        assert!(StatusRequest::decode(&[0x00]).is_err());
    }

    #[test]
    fn test_state_command_decode() {
        let cmd = StateCommand::decode(&[0x02]).unwrap();
        assert_eq!(cmd, StateCommand::request(NodeState::Running));

        let cmd = StateCommand::decode(&[0x00, 0xA5, 0xC3]).unwrap();
        assert_eq!(cmd, StateCommand::reset(0xA5C3));

        assert!(StateCommand::decode(&[]).is_err());
        assert!(StateCommand::decode(&[0x01, 0x00]).is_err());
        assert!(matches!(
            StateCommand::decode(&[0x09]),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_state_command_reset_frame_carries_token() {
        let frame = StateCommand::reset(0x1234).to_frame(0x00, 0x10);
        assert_eq!(frame.data_slice(), &[0x00, 0x12, 0x34]);
    }

    #[test]
    fn test_emergency_reason_mapping() {
        assert_eq!(EmergencyReason::from(0x02), EmergencyReason::LocalFault);
        assert_eq!(EmergencyReason::from(0xEE), EmergencyReason::Unspecified);
        assert_eq!(u8::from(EmergencyReason::WatchdogTimeout), 0x04);
    }

    #[test]
    fn test_emergency_decode_is_fail_safe() {
        assert_eq!(
            EmergencyCommand::decode(&[]).unwrap().reason,
            EmergencyReason::Unspecified
        );
        assert_eq!(
            EmergencyCommand::decode(&[0x01, 0xFF, 0xFF]).unwrap().reason,
            EmergencyReason::Operator
        );
    }

    #[test]
    fn test_emergency_broadcast_frame() {
        let frame = EmergencyCommand::new(EmergencyReason::LocalFault).to_broadcast(0x10);
        let id = frame.identifier().unwrap();
        assert_eq!(id.category(), MessageCategory::Emergency);
        assert!(id.is_broadcast());
        assert_eq!(id.source(), 0x10);
        assert_eq!(frame.data_slice(), &[0x02]);
    }
}
