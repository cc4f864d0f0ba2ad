//! # HAT CAN Adapter Layer
//!
//! CAN 硬件抽象层：调度器只依赖 `CanAdapter` trait，
//! 具体后端（Linux SocketCAN、测试用 mock）在这里实现。

use thiserror::Error;

// 重新导出 hat-protocol 中的 HatFrame
pub use hat_protocol::HatFrame;
use hat_protocol::CanIdentifier;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan::SocketCanAdapter;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::MockCanAdapter;

/// CAN 适配层统一错误类型
#[derive(Error, Debug)]
pub enum CanError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] CanDeviceError),
    #[error("Read timeout")]
    Timeout,
    #[error("Buffer overflow")]
    BufferOverflow,
    #[error("Bus off")]
    BusOff,
}

impl CanError {
    /// 重试无意义的错误（设备消失、权限不足）
    pub fn is_fatal(&self) -> bool {
        match self {
            CanError::Device(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanDeviceErrorKind {
    NotFound,
    AccessDenied,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct CanDeviceError {
    pub kind: CanDeviceErrorKind,
    pub message: String,
}

impl CanDeviceError {
    pub fn new(kind: CanDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            CanDeviceErrorKind::AccessDenied | CanDeviceErrorKind::NotFound
        )
    }
}

/// 硬件接收过滤器
///
/// `raw_id & mask == id & mask` 的帧被接收。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptanceFilter {
    pub id: u32,
    pub mask: u32,
}

impl AcceptanceFilter {
    pub fn new(id: u32, mask: u32) -> Self {
        Self { id, mask }
    }

    /// 只接收目的地址为 `address` 的扩展帧
    pub fn for_destination(address: u8) -> Self {
        let (id, mask) = CanIdentifier::destination_filter(address);
        Self { id, mask }
    }

    pub fn matches(&self, raw_id: u32) -> bool {
        raw_id & self.mask == self.id & self.mask
    }

    /// 过滤器组判定；空组表示全部接收
    pub fn any_matches(filters: &[AcceptanceFilter], raw_id: u32) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(raw_id))
    }
}

/// CAN 传输抽象
///
/// `receive` 没有帧可读时返回 `CanError::Timeout`，
/// 调度器通过 `try_receive` 非阻塞地排空接收队列。
pub trait CanAdapter {
    fn send(&mut self, frame: HatFrame) -> Result<(), CanError>;

    fn receive(&mut self) -> Result<HatFrame, CanError>;

    fn try_receive(&mut self) -> Result<Option<HatFrame>, CanError> {
        match self.receive() {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 安装接收过滤器（不支持过滤的后端忽略即可）
    fn configure_filters(&mut self, _filters: &[AcceptanceFilter]) -> Result<(), CanError> {
        Ok(())
    }

    /// 传输错误后的恢复钩子（如 bus-off 重启）
    fn recover(&mut self) -> Result<(), CanError> {
        Ok(())
    }
}

impl<A: CanAdapter + ?Sized> CanAdapter for Box<A> {
    fn send(&mut self, frame: HatFrame) -> Result<(), CanError> {
        (**self).send(frame)
    }

    fn receive(&mut self) -> Result<HatFrame, CanError> {
        (**self).receive()
    }

    fn try_receive(&mut self) -> Result<Option<HatFrame>, CanError> {
        (**self).try_receive()
    }

    fn configure_filters(&mut self, filters: &[AcceptanceFilter]) -> Result<(), CanError> {
        (**self).configure_filters(filters)
    }

    fn recover(&mut self) -> Result<(), CanError> {
        (**self).recover()
    }
}
