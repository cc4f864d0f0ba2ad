//! run 命令
//!
//! 在真实 CAN 接口上运行 HAT 节点（组件由仿真硬件提供）

use anyhow::{Context, Result};
use clap::Args;
use hat_node::HatConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// 节点运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 节点配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// CAN 接口
    #[arg(short, long, default_value = "can0")]
    pub interface: String,

    /// 运行时长（秒），不指定则运行到 Ctrl+C
    #[arg(short, long)]
    pub duration: Option<u64>,
}

impl RunCommand {
    pub fn execute(&self, running: Arc<AtomicBool>) -> Result<()> {
        let config = HatConfig::load(&self.config)
            .with_context(|| format!("配置无效: {}", self.config.display()))?;
        run_on_bus(&self.interface, config, self.duration, running)
    }
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn run_on_bus(
    interface: &str,
    config: HatConfig,
    duration: Option<u64>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    use hat_can::SocketCanAdapter;
    use hat_node::{Clock, HatNode, MonotonicClock};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tracing::{info, warn};

    use crate::hardware::SimulatedHardware;

    let adapter = SocketCanAdapter::new(interface)
        .with_context(|| format!("打开 CAN 接口失败: {}", interface))?;
    let hardware = SimulatedHardware::from_specs(&config.components);
    let tick = Duration::from_millis(config.tick_period_ms);
    let clock = MonotonicClock::new();

    let mut node = HatNode::new(config, adapter, hardware, clock)?;
    if let Err(e) = node.initialize() {
        // 传输已就绪时节点停在 INIT 继续发心跳，其余错误直接退出
        if !node.dispatcher().is_initialized() {
            return Err(e).context("节点初始化失败");
        }
        warn!("Component discovery incomplete: {}", e);
    }

    let deadline = duration.map(|secs| clock.now_ms() + secs * 1000);
    info!("HAT node running on {} (Ctrl+C to stop)", interface);

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| clock.now_ms() >= d) {
            break;
        }
        node.process_messages();
        node.tick();
        if node.dispatcher().transport_lost() {
            anyhow::bail!("CAN 接口 {} 不可用，节点停止", interface);
        }
        std::thread::sleep(tick);
    }

    info!(
        "HAT node stopped in state {} ({})",
        node.state(),
        node.statistics()
    );
    Ok(())
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn run_on_bus(
    interface: &str,
    _config: HatConfig,
    _duration: Option<u64>,
    _running: Arc<AtomicBool>,
) -> Result<()> {
    anyhow::bail!(
        "SocketCAN 后端不可用（需要 Linux 且启用 socketcan feature），无法打开 {}",
        interface
    )
}
