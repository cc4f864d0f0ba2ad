//! 协议常量定义
//!
//! 集中定义载荷长度与结果码，避免在代码中散落"魔法数"。

/// HEARTBEAT 载荷长度（状态 1 + 应答位图 4）
pub const HEARTBEAT_LEN: usize = 5;

/// TELEMETRY 载荷长度（地址 2 + 数值 4 + 错误码 1）
pub const TELEMETRY_LEN: usize = 7;

/// STATE_RESPONSE 载荷长度（状态 1 + 应答类别 1 + 结果码 1 + 附加信息 2）
pub const STATE_RESPONSE_LEN: usize = 5;

/// EMERGENCY 载荷长度（原因码 1）
pub const EMERGENCY_LEN: usize = 1;

/// CONFIG 配置载荷最大长度（不含组件地址）
pub const CONFIG_PAYLOAD_MAX: usize = 5;

/// 组件状态：未知（初始化后 / 复位后）
pub const COMPONENT_STATE_UNKNOWN: u8 = 0xFF;

/// STATE_RESPONSE 中"非应答"的类别占位值
pub const NO_REPLY_CATEGORY: u8 = 0xFF;

/// 应答结果码（STATE_RESPONSE Byte 2）
///
/// 0 表示 ack，其余为 nack 原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive)]
#[repr(u8)]
pub enum ResultCode {
    Ok = 0x00,
    AddressNotFound = 0x01,
    InvalidConfig = 0x02,
    TransportError = 0x03,
    MalformedFrame = 0x04,
    GuardFailed = 0x05,
    ComponentFault = 0x06,
}

impl ResultCode {
    pub fn is_ack(self) -> bool {
        self == ResultCode::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_from_u8() {
        assert_eq!(ResultCode::try_from(0x00).unwrap(), ResultCode::Ok);
        assert_eq!(ResultCode::try_from(0x05).unwrap(), ResultCode::GuardFailed);
        assert!(ResultCode::try_from(0x07).is_err());
        assert!(ResultCode::Ok.is_ack());
        assert!(!ResultCode::ComponentFault.is_ack());
    }

    #[test]
    fn test_payload_lengths_fit_classic_can() {
        assert!(HEARTBEAT_LEN <= 8);
        assert!(TELEMETRY_LEN <= 8);
        assert!(STATE_RESPONSE_LEN <= 8);
        assert!(2 + CONFIG_PAYLOAD_MAX <= 8);
    }
}
