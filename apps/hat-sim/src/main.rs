//! # HAT Sim
//!
//! HAT 节点的运行器和仿真器。
//!
//! ```bash
//! # 校验配置
//! hat-sim check --config hat.toml
//!
//! # 在内存总线上执行监控器脚本
//! hat-sim simulate --config hat.toml --script bring-up.toml
//!
//! # 在真实总线上运行节点（仿真组件）
//! hat-sim run --config hat.toml --interface can0
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod hardware;
mod script;

use commands::{CheckCommand, RunCommand, SimulateCommand};

/// HAT Sim - HAT 节点运行器和仿真器
#[derive(Parser, Debug)]
#[command(name = "hat-sim")]
#[command(about = "Run or simulate a HAT node on a CAN bus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 校验节点配置
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 在内存总线上执行监控器脚本
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 在 CAN 接口上运行节点
    Run {
        #[command(flatten)]
        args: RunCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hat=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
        Commands::Run { args } => {
            let running = Arc::new(AtomicBool::new(true));
            let flag = running.clone();
            ctrlc::set_handler(move || {
                eprintln!("\nReceived interrupt signal. Shutting down...");
                flag.store(false, Ordering::SeqCst);
            })
            .context("Failed to set signal handler")?;
            args.execute(running)
        },
    }
}
