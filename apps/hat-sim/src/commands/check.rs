//! check 命令
//!
//! 校验节点配置文件并打印硬件映射

use anyhow::{Context, Result};
use clap::Args;
use hat_node::HatConfig;
use std::path::PathBuf;

/// 配置检查命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 节点配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let config = HatConfig::load(&self.config)
            .with_context(|| format!("配置无效: {}", self.config.display()))?;
        print!("{}", summary(&config));
        Ok(())
    }
}

/// 配置摘要
pub fn summary(config: &HatConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "node 0x{:02X}, supervisor 0x{:02X}\n",
        config.node_address, config.supervisor_address
    ));
    out.push_str(&format!(
        "heartbeat {} ms, liveness {} ms, supervisor timeout {} ms, tick {} ms\n",
        config.heartbeat_period_ms,
        config.liveness_timeout_ms,
        config.supervisor_timeout_ms,
        config.tick_period_ms
    ));
    out.push_str(&format!("{} component(s):\n", config.components.len()));
    for spec in &config.components {
        let mut flags = Vec::new();
        if spec.mandatory {
            flags.push("mandatory");
        }
        if spec.safe_mode_exempt {
            flags.push("safe-mode-exempt");
        }
        out.push_str(&format!(
            "  0x{:04X} {:<10} {:?} [{}]\n",
            spec.address,
            spec.name,
            spec.kind,
            flags.join(", ")
        ));
    }
    out
}
