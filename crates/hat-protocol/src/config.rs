//! 组件配置帧 (CONFIG)
//!
//! 载荷布局：
//! - Byte 0-1: 组件地址
//! - Byte 2: 工作模式
//! - Byte 3-6: 模式参数（i32，大端，可选）
//!
//! 合法长度只有 3 和 7。参数取值范围由组件类型决定，在节点侧校验。

use crate::ids::{CanIdentifier, MessageCategory};
use crate::{CONFIG_PAYLOAD_MAX, HatFrame, ProtocolError, bytes_to_i32_be, bytes_to_u16_be};

/// 组件配置载荷（不含地址）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentConfig {
    pub mode: u8,
    pub parameter: Option<i32>,
}

impl ComponentConfig {
    pub fn new(mode: u8) -> Self {
        Self {
            mode,
            parameter: None,
        }
    }

    pub fn with_parameter(mut self, parameter: i32) -> Self {
        self.parameter = Some(parameter);
        self
    }

    /// 编码长度（1 或 5）
    pub fn encoded_len(&self) -> usize {
        if self.parameter.is_some() {
            CONFIG_PAYLOAD_MAX
        } else {
            1
        }
    }
}

/// 组件配置指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigCommand {
    pub address: u16,
    pub config: ComponentConfig,
}

impl ConfigCommand {
    pub fn new(address: u16, config: ComponentConfig) -> Self {
        Self { address, config }
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let parameter = match payload.len() {
            3 => None,
            7 => Some(bytes_to_i32_be([
                payload[3], payload[4], payload[5], payload[6],
            ])),
            actual => {
                return Err(ProtocolError::InvalidLength {
                    category: MessageCategory::Config,
                    actual,
                });
            },
        };

        Ok(Self {
            address: bytes_to_u16_be([payload[0], payload[1]]),
            config: ComponentConfig {
                mode: payload[2],
                parameter,
            },
        })
    }

    pub fn to_frame(self, source: u8, destination: u8) -> HatFrame {
        let mut data = [0u8; 2 + CONFIG_PAYLOAD_MAX];
        data[0..2].copy_from_slice(&self.address.to_be_bytes());
        data[2] = self.config.mode;
        if let Some(parameter) = self.config.parameter {
            data[3..7].copy_from_slice(&parameter.to_be_bytes());
        }
        let len = 2 + self.config.encoded_len();

        let id = CanIdentifier::compose(source, destination, MessageCategory::Config);
        HatFrame::new_extended(id.to_raw(), &data[..len])
    }
}
