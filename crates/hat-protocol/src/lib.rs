//! # HAT Protocol
//!
//! HAT 节点 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 扩展帧标识符位域（源地址 / 目的地址 / 消息类别）与保留地址
//! - `constants`: 协议常量（载荷长度、结果码等）
//! - `control`: 入站指令帧解析（CONTROL / STATUS_REQUEST / STATE_COMMAND / EMERGENCY）
//! - `config`: 组件配置帧（CONFIG）
//! - `feedback`: 出站帧构建（HEARTBEAT / TELEMETRY / STATE_RESPONSE）与 `NodeState`
//! - `message`: 带方向和时间戳的 `HatMessage` 以及按类别解码的 `Inbound`
//!
//! ## 字节序
//!
//! 多字节字段使用 Motorola (MSB) 高位在前（大端字节序）。

pub mod config;
pub mod constants;
pub mod control;
pub mod feedback;
pub mod ids;
pub mod message;

// 重新导出常用类型
pub use config::*;
pub use constants::*;
pub use control::*;
pub use feedback::*;
pub use ids::*;
pub use message::*;

/// CAN 2.0 帧的统一抽象
///
/// `HatFrame` 是协议层和传输层之间的中间抽象：
/// - 协议层通过 `to_frame()` 构建、通过 `decode()` 解析
/// - 传输层（`hat-can`）只负责把它搬到总线上
///
/// ```text
/// Protocol Layer (hat-protocol)
///     ↓ to_frame() / Inbound::decode()
/// HatFrame (此类型)
///     ↓
/// Transport Layer (hat-can: SocketCAN / mock)
/// ```
///
/// - **Copy**：固定 8 字节数据，无堆分配
/// - **时间戳**：`timestamp_us` 由传输层填充，出站帧由调度器填充
///
/// ```rust
/// use hat_protocol::HatFrame;
///
/// let frame = HatFrame::new_extended(0x1C00_1000, &[1, 2, 3]);
/// assert_eq!(frame.id(), 0x1C00_1000);
/// assert_eq!(frame.data_slice(), &[1, 2, 3]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HatFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl HatFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0,
        }
    }

    /// 附带时间戳（微秒）
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 解析扩展帧标识符
    ///
    /// 标准帧不属于 HAT 协议，返回 `ProtocolError::NotExtended`。
    pub fn identifier(&self) -> Result<CanIdentifier, ProtocolError> {
        if !self.is_extended {
            return Err(ProtocolError::NotExtended { id: self.id });
        }
        Ok(CanIdentifier::from_raw(self.id))
    }
}

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid payload length for {category:?}: {actual} bytes")]
    InvalidLength {
        category: MessageCategory,
        actual: usize,
    },

    #[error("Invalid category: expected {expected:?}, got {actual:?}")]
    InvalidCategory {
        expected: MessageCategory,
        actual: MessageCategory,
    },

    #[error("Invalid value for field {field}: 0x{value:02X}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Not an extended frame: 0x{id:X}")]
    NotExtended { id: u32 },
}

/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// 大端字节序转 u32
pub fn bytes_to_u32_be(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// 大端字节序转 i32
pub fn bytes_to_i32_be(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// 大端字节序转 f32（IEEE 754）
pub fn bytes_to_f32_be(bytes: [u8; 4]) -> f32 {
    f32::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_extended_truncates_to_eight_bytes() {
        let frame = HatFrame::new_extended(0x123, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.len, 8);
        assert!(frame.is_extended);
        assert_eq!(frame.data_slice(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_standard_frame_has_no_identifier() {
        let frame = HatFrame::new_standard(0x123, &[0x01]);
        assert_eq!(
            frame.identifier(),
            Err(ProtocolError::NotExtended { id: 0x123 })
        );
    }

    #[test]
    fn test_with_timestamp() {
        let frame = HatFrame::new_extended(0x1, &[]).with_timestamp(42);
        assert_eq!(frame.timestamp_us, 42);
        assert!(frame.data_slice().is_empty());
    }

    #[test]
    fn test_bytes_to_f32_be() {
        let bytes = 1.5f32.to_be_bytes();
        assert_eq!(bytes, [0x3F, 0xC0, 0x00, 0x00]);
        assert_eq!(bytes_to_f32_be(bytes), 1.5);
    }

    #[test]
    fn test_bytes_to_i32_be_negative() {
        assert_eq!(bytes_to_i32_be([0xFF, 0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(bytes_to_u16_be([0x12, 0x34]), 0x1234);
        assert_eq!(bytes_to_u32_be([0x00, 0x00, 0x01, 0x02]), 0x0102);
    }
}
