//! # HAT 节点控制核心
//!
//! 本 crate 提供 HAT 节点的控制核心，包括：
//! - 组件表（固定容量、按地址索引、惰性在线判定）
//! - 节点状态机（INIT / IDLE / RUNNING / SAFE / ESTOP）
//! - CAN 调度器（过滤、路由、应答、心跳、急停广播、通信统计）
//! - `HatNode` 聚合体：外部调度循环只需周期性调用 `process_messages()` 和 `tick()`
//!
//! ```no_run
//! use hat_can::MockCanAdapter;
//! use hat_node::{ComponentKind, HardwareDriver, HatConfig, HatNode, ManualClock};
//!
//! struct Board;
//!
//! impl HardwareDriver for Board {
//!     fn probe(&mut self, _address: u16, _kind: ComponentKind) -> bool {
//!         true
//!     }
//! }
//!
//! let clock = ManualClock::new(0);
//! let mut node = HatNode::new(HatConfig::default(), MockCanAdapter::new(), Board, clock.clone())?;
//! node.initialize()?;
//! loop {
//!     node.process_messages();
//!     node.tick();
//!     clock.advance(10);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod config;
pub mod dispatcher;
mod error;
pub mod hardware;
pub mod metrics;
mod node;
pub mod outbox;
pub mod registry;
pub mod state;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ComponentKind, ComponentSpec, ConfigError, HatConfig};
pub use dispatcher::CanDispatcher;
pub use error::{GuardReason, HatError};
pub use hardware::{HardwareDriver, HardwareFault};
pub use metrics::{CommStatistics, StatisticsSnapshot};
pub use node::HatNode;
pub use outbox::{OutboundFrame, OutboundPriority, Outbox};
pub use registry::{ComponentRecord, ComponentRegistry, ComponentStatus, HAT_MAX_COMPONENTS};
pub use state::{NodeStateMachine, Transition};

// 协议层常用类型
pub use hat_protocol::{EmergencyReason, NodeState};
