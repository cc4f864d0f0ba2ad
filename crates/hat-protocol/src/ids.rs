//! CAN 标识符位域与保留地址
//!
//! HAT 协议只使用 29-bit 扩展帧。标识符布局（LSB first）：
//!
//! | Bit | 字段 |
//! |---|---|
//! | 0-7 | 源节点地址 |
//! | 8-15 | 目的节点地址（`0xFF` 为广播） |
//! | 16-25 | 保留（发送时为 0） |
//! | 26-28 | 消息类别 |
//!
//! 类别位于仲裁场最高位，编码越小优先级越高，EMERGENCY 编码为 0。

use bilge::prelude::*;

/// 广播地址（所有节点都接收）
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// 默认监控器（supervisor）地址
pub const DEFAULT_SUPERVISOR_ADDRESS: u8 = 0x00;

/// 默认本节点地址
pub const DEFAULT_NODE_ADDRESS: u8 = 0x10;

/// 29-bit 扩展帧 ID 掩码
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// 目的地址字段掩码（用于接收过滤器）
pub const DESTINATION_MASK: u32 = 0x0000_FF00;

// ============================================================================
// 消息类别
// ============================================================================

/// 消息类别（3 bit，8 个值全部占用）
///
/// 类别与目的地址共同决定路由。
#[bitsize(3)]
#[derive(FromBits, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    /// 急停（最高仲裁优先级）
    Emergency = 0,
    /// 节点状态切换指令
    StateCommand = 1,
    /// 组件控制指令
    Control = 2,
    /// 组件配置指令
    Config = 3,
    /// 状态查询
    StatusRequest = 4,
    /// 状态应答（含 ack/nack）
    StateResponse = 5,
    /// 组件遥测
    Telemetry = 6,
    /// 心跳
    Heartbeat = 7,
}

impl MessageCategory {
    /// 协议编码值
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 从编码值解析，超出 3 bit 返回 `None`
    pub fn from_code(code: u8) -> Option<Self> {
        if code > 0x07 {
            return None;
        }
        Some(MessageCategory::from(u3::new(code)))
    }
}

// ============================================================================
// 标识符位域
// ============================================================================

/// 扩展帧标识符
///
/// bilge 默认 LSB first，字段声明顺序即为从 Bit 0 开始的布局。
#[bitsize(32)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq)]
pub struct CanIdentifier {
    pub source: u8,                // Bit 0-7
    pub destination: u8,           // Bit 8-15
    reserved: u10,                 // Bit 16-25
    pub category: MessageCategory, // Bit 26-28
    padding: u3,                   // Bit 29-31（非 29-bit ID 部分）
}

impl CanIdentifier {
    /// 组装标识符（保留位清零）
    pub fn compose(source: u8, destination: u8, category: MessageCategory) -> Self {
        let mut id = CanIdentifier::from(0u32);
        id.set_source(source);
        id.set_destination(destination);
        id.set_category(category);
        id
    }

    /// 从原始 CAN ID 解析（只取低 29 bit）
    pub fn from_raw(raw: u32) -> Self {
        CanIdentifier::from(raw & EXTENDED_ID_MASK)
    }

    /// 转换为原始 29-bit CAN ID
    pub fn to_raw(self) -> u32 {
        u32::from(self) & EXTENDED_ID_MASK
    }

    /// 是否为广播帧
    pub fn is_broadcast(&self) -> bool {
        self.destination() == BROADCAST_ADDRESS
    }

    /// 目的地址接收过滤器 `(id, mask)`
    pub fn destination_filter(address: u8) -> (u32, u32) {
        ((address as u32) << 8, DESTINATION_MASK)
    }
}
