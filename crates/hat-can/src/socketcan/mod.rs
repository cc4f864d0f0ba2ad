//! SocketCAN 适配器实现
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率等配置由系统工具（`ip link`）完成，不在应用层设置
//! - **非阻塞**：socket 以非阻塞模式打开，调度器每个周期排空接收队列
//! - **过滤**：接收过滤器下发到内核，只有扩展帧能通过

use crate::{AcceptanceFilter, CanAdapter, CanDeviceError, CanDeviceErrorKind, CanError, HatFrame};
use socketcan::{
    CanError as SocketCanError, CanFilter, CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame,
    Socket, SocketOptions, StandardId,
};
use std::io::ErrorKind;
use tracing::{error, trace, warn};

/// SocketCAN 适配器
///
/// ```no_run
/// use hat_can::{CanAdapter, HatFrame, SocketCanAdapter};
///
/// let mut adapter = SocketCanAdapter::new("vcan0").unwrap();
/// adapter.send(HatFrame::new_extended(0x1C00_0010, &[0x01])).unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    socket: CanSocket,
    interface: String,
}

impl SocketCanAdapter {
    /// 打开 CAN 接口（接口必须已经 UP）
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        let socket = CanSocket::open(&interface).map_err(|e| {
            let kind = match e.kind() {
                ErrorKind::NotFound => CanDeviceErrorKind::NotFound,
                ErrorKind::PermissionDenied => CanDeviceErrorKind::AccessDenied,
                _ => CanDeviceErrorKind::Backend,
            };
            CanError::Device(CanDeviceError::new(
                kind,
                format!("Failed to open CAN interface '{}': {}", interface, e),
            ))
        })?;

        socket.set_nonblocking(true).map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened (non-blocking)", interface);
        Ok(Self { socket, interface })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn to_can_frame(frame: &HatFrame) -> Result<CanFrame, CanError> {
        let data = frame.data_slice();
        let can_frame = if frame.is_extended {
            ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, data))
        } else {
            StandardId::new(frame.id as u16).and_then(|id| CanFrame::new(id, data))
        };

        can_frame.ok_or_else(|| {
            CanError::Device(CanDeviceError::new(
                CanDeviceErrorKind::InvalidFrame,
                format!("Failed to build CAN frame with ID 0x{:X}", frame.id),
            ))
        })
    }
}

impl CanAdapter for SocketCanAdapter {
    fn send(&mut self, frame: HatFrame) -> Result<(), CanError> {
        let can_frame = Self::to_can_frame(&frame)?;

        self.socket.write_frame(&can_frame).map_err(|e| match e.kind() {
            // 发送缓冲区满
            ErrorKind::WouldBlock => CanError::BufferOverflow,
            _ => CanError::Io(e),
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 非阻塞接收；无数据时返回 `CanError::Timeout`
    fn receive(&mut self) -> Result<HatFrame, CanError> {
        let can_frame = match self.socket.read_frame() {
            Ok(frame) => frame,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Err(CanError::Timeout),
            Err(e) => return Err(CanError::Io(e)),
        };

        if let CanFrame::Error(error_frame) = can_frame {
            let socketcan_error = SocketCanError::from(error_frame);
            return Err(match socketcan_error {
                SocketCanError::BusOff => {
                    error!("CAN Bus Off error detected on '{}'", self.interface);
                    CanError::BusOff
                },
                other => {
                    warn!("CAN error frame on '{}': {}", self.interface, other);
                    CanError::Device(CanDeviceError::new(
                        CanDeviceErrorKind::Backend,
                        other.to_string(),
                    ))
                },
            });
        }

        let frame = if can_frame.is_extended() {
            HatFrame::new_extended(can_frame.raw_id(), can_frame.data())
        } else {
            HatFrame::new_standard(can_frame.raw_id() as u16, can_frame.data())
        };

        trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(frame)
    }

    fn configure_filters(&mut self, filters: &[AcceptanceFilter]) -> Result<(), CanError> {
        let can_filters: Vec<CanFilter> = filters
            .iter()
            .map(|f| {
                CanFilter::new(
                    f.id | libc::CAN_EFF_FLAG,
                    f.mask | libc::CAN_EFF_FLAG,
                )
            })
            .collect();

        self.socket.set_filters(&can_filters).map_err(CanError::Io)?;
        trace!(
            "SocketCAN '{}' installed {} acceptance filter(s)",
            self.interface,
            can_filters.len()
        );
        Ok(())
    }

    /// bus-off 由内核 `restart-ms` 负责重启，这里只记录
    fn recover(&mut self) -> Result<(), CanError> {
        warn!(
            "Transport error on '{}', relying on kernel restart-ms for bus recovery",
            self.interface
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_interface_fails() {
        let err = SocketCanAdapter::new("hatnosuchcan0").unwrap_err();
        assert!(matches!(err, CanError::Device(_) | CanError::Io(_)));
    }

    #[test]
    fn test_to_can_frame_extended() {
        let frame = HatFrame::new_extended(0x1C00_0010, &[1, 2, 3]);
        let can_frame = SocketCanAdapter::to_can_frame(&frame).unwrap();
        assert!(can_frame.is_extended());
        assert_eq!(can_frame.raw_id(), 0x1C00_0010);
        assert_eq!(can_frame.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_to_can_frame_rejects_oversized_id() {
        let frame = HatFrame::new_extended(0x2000_0000, &[]);
        assert!(SocketCanAdapter::to_can_frame(&frame).is_err());
    }
}
