//! 出站帧结构体定义
//!
//! 包含节点状态枚举以及 HEARTBEAT / TELEMETRY / STATE_RESPONSE 三类
//! 出站帧的构建与解析（解析用于监控器侧和测试）。

use crate::ids::{CanIdentifier, MessageCategory};
use crate::{
    HEARTBEAT_LEN, HatFrame, NO_REPLY_CATEGORY, ProtocolError, ResultCode, STATE_RESPONSE_LEN,
    TELEMETRY_LEN, bytes_to_f32_be, bytes_to_u16_be,
};

// ============================================================================
// 节点状态
// ============================================================================

/// 节点运行状态
///
/// INIT → IDLE → RUNNING 为正常路径，SAFE 和 ESTOP 为安全状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum NodeState {
    /// 初始化中
    #[default]
    Init = 0x00,
    /// 待机
    Idle = 0x01,
    /// 运行
    Running = 0x02,
    /// 安全模式
    Safe = 0x03,
    /// 急停（只能通过带令牌的复位指令退出）
    Estop = 0x04,
}

impl NodeState {
    /// 是否为安全状态（SAFE / ESTOP）
    pub fn is_safety_state(self) -> bool {
        matches!(self, NodeState::Safe | NodeState::Estop)
    }

    /// 从协议字节解析
    pub fn from_wire(value: u8) -> Result<Self, ProtocolError> {
        NodeState::try_from(value).map_err(|_| ProtocolError::InvalidValue {
            field: "NodeState",
            value,
        })
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeState::Init => "INIT",
            NodeState::Idle => "IDLE",
            NodeState::Running => "RUNNING",
            NodeState::Safe => "SAFE",
            NodeState::Estop => "ESTOP",
        };
        f.write_str(name)
    }
}

// ============================================================================
// 心跳
// ============================================================================

/// 心跳帧 (HEARTBEAT)
///
/// Byte 0: 节点状态；Byte 1-4: 组件应答位图（Bit i = 第 i 个组件在线）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatFrame {
    pub state: NodeState,
    pub responding_bitmap: u32,
}

impl HeartbeatFrame {
    pub fn new(state: NodeState, responding_bitmap: u32) -> Self {
        Self {
            state,
            responding_bitmap,
        }
    }

    /// 解析载荷
    ///
    /// 监控器发出的心跳可能只带状态字节，因此接受 1-5 字节，
    /// 位图按已有字节大端右对齐。
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.is_empty() || payload.len() > HEARTBEAT_LEN {
            return Err(ProtocolError::InvalidLength {
                category: MessageCategory::Heartbeat,
                actual: payload.len(),
            });
        }

        let state = NodeState::from_wire(payload[0])?;
        let responding_bitmap = payload[1..]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        Ok(Self {
            state,
            responding_bitmap,
        })
    }

    /// 转换为 CAN 帧
    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let mut data = [0u8; HEARTBEAT_LEN];
        data[0] = self.state as u8;
        data[1..5].copy_from_slice(&self.responding_bitmap.to_be_bytes());

        let id = CanIdentifier::compose(source, destination, MessageCategory::Heartbeat);
        HatFrame::new_extended(id.to_raw(), &data)
    }
}

// ============================================================================
// 遥测
// ============================================================================

/// 组件遥测帧 (TELEMETRY)
///
/// 时间戳不占载荷，放在 `HatFrame::timestamp_us`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub address: u16,   // Byte 0-1
    pub value: f32,     // Byte 2-5 (IEEE 754, 大端)
    pub error_code: u8, // Byte 6
}

impl TelemetryFrame {
    pub fn new(address: u16, value: f32, error_code: u8) -> Self {
        Self {
            address,
            value,
            error_code,
        }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != TELEMETRY_LEN {
            return Err(ProtocolError::InvalidLength {
                category: MessageCategory::Telemetry,
                actual: payload.len(),
            });
        }

        Ok(Self {
            address: bytes_to_u16_be([payload[0], payload[1]]),
            value: bytes_to_f32_be([payload[2], payload[3], payload[4], payload[5]]),
            error_code: payload[6],
        })
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let mut data = [0u8; TELEMETRY_LEN];
        data[0..2].copy_from_slice(&self.address.to_be_bytes());
        data[2..6].copy_from_slice(&self.value.to_be_bytes());
        data[6] = self.error_code;

        let id = CanIdentifier::compose(source, destination, MessageCategory::Telemetry);
        HatFrame::new_extended(id.to_raw(), &data)
    }
}

// ============================================================================
// 状态应答（含 ack / nack）
// ============================================================================

/// 状态应答帧 (STATE_RESPONSE)
///
/// 既用于回显当前节点状态，也作为 CONTROL / CONFIG / STATE_COMMAND 的 ack/nack：
/// - Byte 0: 当前节点状态
/// - Byte 1: 应答的请求类别（`0xFF` 表示非应答）
/// - Byte 2: 结果码（0 = ack）
/// - Byte 3-4: 附加信息（组件地址或守卫原因）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateResponseFrame {
    pub state: NodeState,
    pub reply_to: Option<MessageCategory>,
    pub result: ResultCode,
    pub detail: u16,
}

impl StateResponseFrame {
    /// 非应答的状态回显
    pub fn unsolicited(state: NodeState) -> Self {
        Self {
            state,
            reply_to: None,
            result: ResultCode::Ok,
            detail: 0,
        }
    }

    pub fn ack(state: NodeState, reply_to: MessageCategory, detail: u16) -> Self {
        Self {
            state,
            reply_to: Some(reply_to),
            result: ResultCode::Ok,
            detail,
        }
    }

    pub fn nack(
        state: NodeState,
        reply_to: MessageCategory,
        result: ResultCode,
        detail: u16,
    ) -> Self {
        Self {
            state,
            reply_to: Some(reply_to),
            result,
            detail,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.result.is_ack()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != STATE_RESPONSE_LEN {
            return Err(ProtocolError::InvalidLength {
                category: MessageCategory::StateResponse,
                actual: payload.len(),
            });
        }

        let state = NodeState::from_wire(payload[0])?;
        let reply_to = match payload[1] {
            NO_REPLY_CATEGORY => None,
            code => Some(MessageCategory::from_code(code).ok_or(
                ProtocolError::InvalidValue {
                    field: "ReplyCategory",
                    value: code,
                },
            )?),
        };
        let result = ResultCode::try_from(payload[2]).map_err(|_| ProtocolError::InvalidValue {
            field: "ResultCode",
            value: payload[2],
        })?;

        Ok(Self {
            state,
            reply_to,
            result,
            detail: bytes_to_u16_be([payload[3], payload[4]]),
        })
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let mut data = [0u8; STATE_RESPONSE_LEN];
        data[0] = self.state as u8;
        data[1] = self.reply_to.map_or(NO_REPLY_CATEGORY, MessageCategory::code);
        data[2] = self.result as u8;
        data[3..5].copy_from_slice(&self.detail.to_be_bytes());

        let id = CanIdentifier::compose(source, destination, MessageCategory::StateResponse);
        HatFrame::new_extended(id.to_raw(), &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_state_from_wire() {
        assert_eq!(NodeState::from_wire(0x02).unwrap(), NodeState::Running);
        assert_eq!(NodeState::from_wire(0x04).unwrap(), NodeState::Estop);
        assert!(NodeState::from_wire(0x05).is_err());
        assert!(NodeState::Safe.is_safety_state());
        assert!(!NodeState::Idle.is_safety_state());
        assert_eq!(NodeState::Estop.to_string(), "ESTOP");
    }

    #[test]
    fn test_heartbeat_frame_layout() {
        let frame = HeartbeatFrame::new(NodeState::Running, 0x0000_0005).to_frame(0x10, 0xFF);
        assert!(frame.is_extended);
        assert_eq!(frame.data_slice(), &[0x02, 0x00, 0x00, 0x00, 0x05]);

        let id = frame.identifier().unwrap();
        assert_eq!(id.category(), MessageCategory::Heartbeat);
        assert_eq!(id.source(), 0x10);
        assert_eq!(id.destination(), 0xFF);
    }

    #[test]
    fn test_heartbeat_decode_short_payload() {
        // 监控器心跳只带状态字节
        let hb = HeartbeatFrame::decode(&[0x01]).unwrap();
        assert_eq!(hb.state, NodeState::Idle);
        assert_eq!(hb.responding_bitmap, 0);

        let hb = HeartbeatFrame::decode(&[0x02, 0x01, 0x80]).unwrap();
        assert_eq!(hb.responding_bitmap, 0x0180);

        assert!(HeartbeatFrame::decode(&[]).is_err());
        assert!(HeartbeatFrame::decode(&[0x01; 6]).is_err());
    }

    #[test]
    fn test_telemetry_frame_layout() {
        let frame = TelemetryFrame::new(0x0120, 1.5, 0x03).to_frame(0x10, 0x00);
        assert_eq!(
            frame.data_slice(),
            &[0x01, 0x20, 0x3F, 0xC0, 0x00, 0x00, 0x03]
        );

        let decoded = TelemetryFrame::decode(frame.data_slice()).unwrap();
        assert_eq!(decoded.address, 0x0120);
        assert_eq!(decoded.value, 1.5);
        assert_eq!(decoded.error_code, 0x03);
    }

    #[test]
    fn test_telemetry_invalid_length() {
        let err = TelemetryFrame::decode(&[0; 4]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                category: MessageCategory::Telemetry,
                actual: 4
            }
        );
    }

    #[test]
    fn test_state_response_nack_layout() {
        let frame = StateResponseFrame::nack(
            NodeState::Idle,
            MessageCategory::StateCommand,
            ResultCode::GuardFailed,
            0x0020,
        )
        .to_frame(0x10, 0x00);
        assert_eq!(frame.data_slice(), &[0x01, 0x01, 0x05, 0x00, 0x20]);
    }

    #[test]
    fn test_state_response_unsolicited() {
        let frame = StateResponseFrame::unsolicited(NodeState::Safe).to_frame(0x10, 0x00);
        assert_eq!(frame.data_slice(), &[0x03, 0xFF, 0x00, 0x00, 0x00]);

        let decoded = StateResponseFrame::decode(frame.data_slice()).unwrap();
        assert_eq!(decoded.reply_to, None);
        assert!(decoded.is_ack());
    }

    #[test]
    fn test_state_response_rejects_unknown_result_code() {
        assert!(StateResponseFrame::decode(&[0x01, 0xFF, 0x09, 0, 0]).is_err());
        assert!(StateResponseFrame::decode(&[0x01, 0x09, 0x00, 0, 0]).is_err());
    }

    #[test]
    fn test_node_state_default_and_unknown_byte() {
        assert_eq!(NodeState::default(), NodeState::Init);
        assert!(NodeState::from_wire(0x05).is_err());
        assert!(StateResponseFrame::decode(&[0x05, 0xFF, 0x00, 0, 0]).is_err());
    }
}
