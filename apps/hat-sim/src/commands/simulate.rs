//! simulate 命令
//!
//! 在内存总线上执行监控器脚本

use anyhow::{Context, Result};
use clap::Args;
use hat_node::HatConfig;
use std::path::PathBuf;

use crate::hardware::SimulatedHardware;
use crate::script::{Script, ScriptRunner};

/// 脚本仿真命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 节点配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 监控器脚本（TOML）
    #[arg(short, long)]
    pub script: PathBuf,

    /// 探测时不应答的组件地址（可重复）
    #[arg(long, value_parser = parse_address)]
    pub missing: Vec<u16>,

    /// 失败时继续执行
    #[arg(long)]
    pub continue_on_error: bool,
}

/// 解析组件地址（支持 0x 前缀）
pub fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid component address '{}': {}", s, e))
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = HatConfig::load(&self.config)
            .with_context(|| format!("配置无效: {}", self.config.display()))?;
        let script = Script::load(&self.script)?;

        println!("📜 脚本: {} ({} 步)", script.name, script.steps.len());
        if !script.description.is_empty() {
            println!("    {}", script.description);
        }

        let hardware =
            SimulatedHardware::from_specs(&config.components).with_missing(self.missing.clone());
        let mut runner =
            ScriptRunner::new(config, hardware)?.continue_on_error(self.continue_on_error);
        let report = runner.run(&script)?;

        println!();
        println!("📊 执行结果:");
        println!("  总步骤数: {}", report.total_steps);
        println!("  失败: {}", report.failed.len());
        println!("  nack: {}", report.nacks);
        println!("  最终状态: {}", report.final_state);
        println!("  通信统计: {}", report.statistics);
        println!("  仿真时长: {} ms", report.elapsed_ms);
        println!();
        println!("🔧 组件:");
        for record in runner.node().registry().records() {
            println!(
                "  0x{:04X} {:?}: state=0x{:02X} enabled={} value={:.2} error=0x{:02X}",
                record.address,
                record.kind,
                record.state,
                record.enabled,
                record.value,
                record.error_code
            );
        }

        if !report.failed.is_empty() {
            println!();
            println!("❌ 失败的步骤:");
            for (idx, err) in &report.failed {
                println!("  步骤 {}: {}", idx + 1, err);
            }
            anyhow::bail!("{} step(s) failed", report.failed.len());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x20"), Ok(0x20));
        assert_eq!(parse_address("0X1f"), Ok(0x1F));
        assert_eq!(parse_address("48"), Ok(48));
        assert!(parse_address("0xZZ").is_err());
        assert!(parse_address("70000").is_err());
    }
}
