//! 配置管理命令
//!
//! 配置文件为 TOML，对应 `SyncConfig`；缺省的键取默认值。

use anyhow::{Context, Result};
use armsync_client::SyncConfig;
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("armsync");
    path.push("config.toml");
    Ok(path)
}

fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_file(),
    }
}

/// 解析生效的配置
///
/// 显式指定的文件必须存在；默认位置没有文件时使用默认配置。
pub fn resolve(explicit: Option<&Path>) -> Result<SyncConfig> {
    if let Some(path) = explicit {
        return SyncConfig::load_from_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()));
    }
    let path = default_config_file()?;
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    SyncConfig::load_from_file(&path).with_context(|| format!("加载配置失败: {}", path.display()))
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置
    Show,

    /// 写入默认配置文件
    Init {
        /// 使用仿真预设（超时 3 秒）
        #[arg(long)]
        simulation: bool,

        /// 覆盖已存在的文件
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, explicit: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let config = resolve(explicit)?;
                println!("# {}", config_file(explicit)?.display());
                print!("{}", config.to_toml_string()?);
                Ok(())
            },
            ConfigCommand::Init { simulation, force } => {
                let path = config_file(explicit)?;
                let config = if simulation {
                    SyncConfig::simulation()
                } else {
                    SyncConfig::default()
                };
                write_config(&path, &config, force)?;
                println!("✅ 已写入配置文件: {}", path.display());
                Ok(())
            },
        }
    }
}

fn write_config(path: &Path, config: &SyncConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("创建配置目录失败")?;
    }
    let content = format!("# armsync configuration\n\n{}", config.to_toml_string()?);
    fs::write(path, content).context("写入配置文件失败")?;
    Ok(())
}
