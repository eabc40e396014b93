//! # armsync CLI
//!
//! 通过命令槽 / 确认槽驱动机械臂的命令行工具。
//!
//! ## 典型用法
//!
//! ```bash
//! # 终端 1：在槽位目录上运行仿真执行器
//! armsync-cli --dir /tmp/arm sim
//!
//! # 终端 2：发送目标并等待确认
//! armsync-cli --dir /tmp/arm send --to 0.1,0.5,-0.2 --to 0.1,0.6,-0.2 --gripper 0
//!
//! # 查看两个槽位的当前内容
//! armsync-cli --dir /tmp/arm status
//!
//! # 交互式 Shell
//! $ armsync-cli --dir /tmp/arm shell
//! armsync> goto 0.1 0.5 -0.2
//! armsync> move up 5
//! armsync> grip close
//! armsync> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod modes;
mod utils;

use commands::{ConfigCommand, SendCommand, SimCommand, StatusCommand};

/// armsync CLI - 机械臂命令同步工具
#[derive(Parser, Debug)]
#[command(name = "armsync-cli")]
#[command(about = "Drive a robot arm through shared command/acknowledgment slots")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// 槽位目录（命令槽 / 确认槽文件所在目录）
    #[arg(short, long, global = true, default_value = ".armsync")]
    dir: PathBuf,

    /// 配置文件（默认：<配置目录>/armsync/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 运行仿真执行器
    Sim {
        #[command(flatten)]
        args: SimCommand,
    },

    /// 发送目标并等待全部确认
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 打印两个槽位的当前内容
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell,

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("armsync=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sim { args } => args.execute(&cli.dir),
        Commands::Send { args } => {
            let config = commands::config::resolve(cli.config.as_deref())?;
            args.execute(&cli.dir, config)
        },
        Commands::Status { args } => args.execute(&cli.dir),
        Commands::Shell => {
            let config = commands::config::resolve(cli.config.as_deref())?;
            modes::repl::run_repl(&cli.dir, config)
        },
        Commands::Config(cmd) => cmd.execute(cli.config.as_deref()),
    }
}
