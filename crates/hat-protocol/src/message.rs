//! 带方向的消息记录与按类别解码

use crate::config::ConfigCommand;
use crate::control::{ControlCommand, EmergencyCommand, StateCommand, StatusRequest};
use crate::feedback::{HeartbeatFrame, StateResponseFrame, TelemetryFrame};
use crate::ids::{CanIdentifier, MessageCategory};
use crate::{HatFrame, ProtocolError};

/// 帧方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => f.write_str("RX"),
            Direction::Outbound => f.write_str("TX"),
        }
    }
}

/// 已解析标识符的帧，附带方向
///
/// 时间戳沿用 `HatFrame::timestamp_us`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HatMessage {
    pub identifier: CanIdentifier,
    pub frame: HatFrame,
    pub direction: Direction,
}

impl HatMessage {
    pub fn new(frame: HatFrame, direction: Direction) -> Result<Self, ProtocolError> {
        Ok(Self {
            identifier: frame.identifier()?,
            frame,
            direction,
        })
    }

    pub fn category(&self) -> MessageCategory {
        self.identifier.category()
    }

    pub fn timestamp_us(&self) -> u64 {
        self.frame.timestamp_us
    }

    /// 目的地址是否为 `address`（或广播）
    pub fn is_addressed_to(&self, address: u8) -> bool {
        self.identifier.destination() == address || self.identifier.is_broadcast()
    }
}

/// 按类别解码后的载荷
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inbound {
    Emergency(EmergencyCommand),
    StateCommand(StateCommand),
    Control(ControlCommand),
    Config(ConfigCommand),
    StatusRequest(StatusRequest),
    StateResponse(StateResponseFrame),
    Telemetry(TelemetryFrame),
    Heartbeat(HeartbeatFrame),
}

impl Inbound {
    /// 根据标识符中的类别解码载荷
    pub fn decode(message: &HatMessage) -> Result<Self, ProtocolError> {
        let payload = message.frame.data_slice();
        Ok(match message.category() {
            MessageCategory::Emergency => Inbound::Emergency(EmergencyCommand::decode(payload)?),
            MessageCategory::StateCommand => {
                Inbound::StateCommand(StateCommand::decode(payload)?)
            },
            MessageCategory::Control => Inbound::Control(ControlCommand::decode(payload)?),
            MessageCategory::Config => Inbound::Config(ConfigCommand::decode(payload)?),
            MessageCategory::StatusRequest => {
                Inbound::StatusRequest(StatusRequest::decode(payload)?)
            },
            MessageCategory::StateResponse => {
                Inbound::StateResponse(StateResponseFrame::decode(payload)?)
            },
            MessageCategory::Telemetry => Inbound::Telemetry(TelemetryFrame::decode(payload)?),
            MessageCategory::Heartbeat => Inbound::Heartbeat(HeartbeatFrame::decode(payload)?),
        })
    }

    pub fn category(&self) -> MessageCategory {
        match self {
            Inbound::Emergency(_) => MessageCategory::Emergency,
            Inbound::StateCommand(_) => MessageCategory::StateCommand,
            Inbound::Control(_) => MessageCategory::Control,
            Inbound::Config(_) => MessageCategory::Config,
            Inbound::StatusRequest(_) => MessageCategory::StatusRequest,
            Inbound::StateResponse(_) => MessageCategory::StateResponse,
            Inbound::Telemetry(_) => MessageCategory::Telemetry,
            Inbound::Heartbeat(_) => MessageCategory::Heartbeat,
        }
    }
}
