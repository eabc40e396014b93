//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程持有 rustyline 编辑器并通过通道把输入交给主线程，
//! 主线程驱动 `QueueManager`；调度事件在另一条线程上打印。

use anyhow::{Context, Result};
use armsync_client::{Direction, DispatchEvent, QueueManager, StateSource, SyncConfig};
use armsync_driver::FileMedium;
use armsync_protocol::Position;
use crossbeam_channel::{Receiver, bounded};
use rustyline::Editor;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crate::utils::{parse_gripper, parse_position};

const HISTORY_FILE: &str = ".armsync_history";

/// Shell 命令
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// 绝对移动
    Goto(Position),
    /// 相对移动（多段时合成一条斜向目标）
    Move(Vec<(Direction, f64)>),
    /// 设置夹爪宽度
    Grip(f64),
    /// 回到上一个位置
    Back,
    /// 急停
    Stop,
    Resume,
    Clear,
    Status,
    Help,
    Exit,
}

impl ShellCommand {
    /// 解析一行输入
    pub fn parse(line: &str) -> Result<Self, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = parts.split_first() else {
            return Err("empty command".to_string());
        };

        match head.to_ascii_lowercase().as_str() {
            "goto" | "go" => parse_position(&args.join(" ")).map(ShellCommand::Goto),
            "move" | "mv" => parse_moves(args).map(ShellCommand::Move),
            "grip" | "gripper" => match args {
                [width] => parse_gripper(width).map(ShellCommand::Grip),
                _ => Err("usage: grip open|close|<meters>".to_string()),
            },
            "back" | "previous" => Ok(ShellCommand::Back),
            "stop" | "halt" => Ok(ShellCommand::Stop),
            "resume" => Ok(ShellCommand::Resume),
            "clear" => Ok(ShellCommand::Clear),
            "status" | "st" => Ok(ShellCommand::Status),
            "help" | "?" => Ok(ShellCommand::Help),
            "exit" | "quit" => Ok(ShellCommand::Exit),
            other => Err(format!("unknown command {:?}", other)),
        }
    }
}

/// 解析 `<dir> <cm> [<dir> <cm> ...]`
fn parse_moves(args: &[&str]) -> Result<Vec<(Direction, f64)>, String> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err("usage: move <dir> <cm> [<dir> <cm> ...]".to_string());
    }
    args.chunks(2)
        .map(|pair| {
            let direction: Direction = pair[0].parse().map_err(|e| format!("{}", e))?;
            let distance = pair[1]
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .ok_or_else(|| format!("invalid distance {:?}", pair[1]))?;
            Ok((direction, distance))
        })
        .collect()
}

/// 输入线程发来的一行
enum ReplLine {
    Line(String),
    Interrupted,
}

/// REPL 输入（专用输入线程）
struct ReplInput {
    line_rx: Receiver<ReplLine>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    fn new() -> Self {
        let (line_tx, line_rx) = bounded::<ReplLine>(10);

        // 编辑器在输入线程内创建，生命周期与会话一致
        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
            rl.load_history(HISTORY_FILE).ok(); // 首次运行没有历史

            loop {
                match rl.readline("armsync> ") {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        let _ = rl.add_history_entry(line.clone());
                        let exit = matches!(line.as_str(), "exit" | "quit");
                        if line_tx.send(ReplLine::Line(line)).is_err() || exit {
                            break;
                        }
                    },
                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        // Ctrl+C：交给主线程急停
                        println!("^C");
                        if line_tx.send(ReplLine::Interrupted).is_err() {
                            break;
                        }
                    },
                    Err(rustyline::error::ReadlineError::Eof) => break,
                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            rl.save_history(HISTORY_FILE).ok();
            Ok(())
        });

        Self {
            line_rx,
            _input_thread: input_thread,
        }
    }

    /// 阻塞等待下一行；输入线程退出（Ctrl+D）时返回 `None`
    fn recv(&self) -> Option<ReplLine> {
        self.line_rx.recv().ok()
    }
}

/// 运行 REPL 模式
pub fn run_repl(dir: &Path, config: SyncConfig) -> Result<()> {
    let medium = Arc::new(FileMedium::open(dir).context("打开槽位目录失败")?);
    let manager = QueueManager::start(medium, config)?;

    let events = manager.subscribe();
    thread::Builder::new()
        .name("armsync-events".into())
        .spawn(move || {
            for event in events {
                print_event(&event);
            }
        })
        .context("启动事件线程失败")?;

    println!("armsync v{} - 交互式 Shell（{}）", env!("CARGO_PKG_VERSION"), dir.display());
    println!("输入 'help' 查看帮助，'exit' 退出，Ctrl+C 急停");
    println!();

    let input = ReplInput::new();
    while let Some(line) = input.recv() {
        let line = match line {
            ReplLine::Interrupted => {
                let dropped = manager.emergency_halt();
                eprintln!("🛑 急停：丢弃 {} 个未发送目标（'resume' 恢复）", dropped);
                continue;
            },
            ReplLine::Line(line) => line,
        };

        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("❌ {}", err);
                println!("💡 输入 'help' 查看可用命令");
                continue;
            },
        };

        if command == ShellCommand::Exit {
            break;
        }
        if let Err(err) = handle_command(&manager, command) {
            eprintln!("❌ Error: {}", err);
        }
    }

    println!("👋 再见！");
    manager.shutdown();
    Ok(())
}

/// 执行一条命令
fn handle_command(manager: &QueueManager, command: ShellCommand) -> Result<()> {
    match command {
        ShellCommand::Goto(position) => {
            let target = manager.enqueue(position)?;
            println!("➕ 入队 {}", target.pose());
        },
        ShellCommand::Move(moves) => {
            let target = match moves.as_slice() {
                [(direction, cm)] => manager.enqueue_relative(*direction, *cm)?,
                _ => manager.enqueue_combined(&moves)?,
            };
            println!("➕ 入队 {}", target.pose());
        },
        ShellCommand::Grip(width) => {
            manager.set_gripper(width)?;
            println!("✋ 夹爪 → {:.3} m", width);
        },
        ShellCommand::Back => match manager.enqueue_previous()? {
            Some(target) => println!("↩️  入队 {}", target.pose()),
            None => println!("没有可返回的位置"),
        },
        ShellCommand::Stop => {
            let dropped = manager.emergency_halt();
            println!("🛑 急停：丢弃 {} 个未发送目标", dropped);
        },
        ShellCommand::Resume => {
            manager.resume();
            println!("▶️  已恢复");
        },
        ShellCommand::Clear => {
            let dropped = manager.clear_queue();
            println!("🧹 丢弃 {} 个未发送目标", dropped);
        },
        ShellCommand::Status => print_status(manager),
        ShellCommand::Help => print_help(),
        ShellCommand::Exit => {},
    }
    Ok(())
}

fn print_event(event: &DispatchEvent) {
    match event {
        DispatchEvent::Dispatched { seq, target } => println!("📤 {} → {}", seq, target.pose()),
        DispatchEvent::Confirmed { seq, state, latency } => {
            let p = state.position;
            println!(
                "✅ {} 已确认 ({:.3}, {:.3}, {:.3})，耗时 {:?}",
                seq, p.x, p.y, p.z, latency
            );
        },
        DispatchEvent::TimedOut { seq, target, waited } => {
            println!("⚠️  {} 等待 {:?} 未确认，按目标 {} 继续", seq, waited, target.pose());
        },
        DispatchEvent::WriteFailed { target, attempts } => {
            println!("❌ 写入 {} 失败（{} 次尝试），已丢弃", target.pose(), attempts);
        },
        DispatchEvent::Halted { .. } | DispatchEvent::Resumed => {},
    }
}

fn print_status(manager: &QueueManager) {
    let state = manager.position();
    let stats = manager.stats();
    let source = match state.source {
        StateSource::Initial => "初始",
        StateSource::Local => "本地",
        StateSource::Confirmed => "已确认",
        StateSource::Fallback => "回退",
    };
    println!("📊 状态:");
    println!("  位置:   {}（{}）", state.pose, source);
    println!("  夹爪:   {:.3} m", state.gripper);
    println!("  阶段:   {}", manager.phase());
    println!(
        "  队列:   {} 个待发送{}{}",
        stats.queue_len,
        if stats.in_flight { "，1 个在途" } else { "" },
        if stats.halted { "，急停中" } else { "" }
    );
    println!(
        "  统计:   发送 {} / 确认 {} / 超时 {} / 写入失败 {}",
        stats.total_sent, stats.total_confirmed, stats.total_timed_out, stats.write_failures
    );
}

fn print_help() {
    println!("可用命令:");
    println!("  goto <x> <y> <z>              移动到绝对位置（米）");
    println!("  move <dir> <cm> [<dir> <cm>]  相对移动，多段合成一条斜线");
    println!("                                dir: right/left/up/down/forward/backward");
    println!("  grip open|close|<m>           设置夹爪宽度（折叠进下一条命令）");
    println!("  back                          回到上一个位置");
    println!("  stop                          急停（丢弃未发送目标）");
    println!("  resume                        解除急停");
    println!("  clear                         丢弃未发送目标");
    println!("  status                        显示状态");
    println!("  help                          显示帮助");
    println!("  exit                          退出");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goto() {
        assert_eq!(
            ShellCommand::parse("goto 0.1 0.2 0.3").unwrap(),
            ShellCommand::Goto(Position::new(0.1, 0.2, 0.3))
        );
        assert_eq!(
            ShellCommand::parse("go 1,2,3").unwrap(),
            ShellCommand::Goto(Position::new(1.0, 2.0, 3.0))
        );
        assert!(ShellCommand::parse("goto 1 2").is_err());
    }

    #[test]
    fn test_parse_combined_move() {
        assert_eq!(
            ShellCommand::parse("move right 5 up 3").unwrap(),
            ShellCommand::Move(vec![(Direction::Right, 5.0), (Direction::Up, 3.0)])
        );
        assert_eq!(
            ShellCommand::parse("mv b 2").unwrap(),
            ShellCommand::Move(vec![(Direction::Backward, 2.0)])
        );
        assert!(ShellCommand::parse("move right").is_err());
        assert!(ShellCommand::parse("move sideways 5").is_err());
        assert!(ShellCommand::parse("move up inf").is_err());
    }

    #[test]
    fn test_parse_grip_and_controls() {
        assert_eq!(ShellCommand::parse("grip close").unwrap(), ShellCommand::Grip(0.0));
        assert_eq!(ShellCommand::parse("grip 0.04").unwrap(), ShellCommand::Grip(0.04));
        assert!(ShellCommand::parse("grip").is_err());
        assert_eq!(ShellCommand::parse("STOP").unwrap(), ShellCommand::Stop);
        assert_eq!(ShellCommand::parse("back").unwrap(), ShellCommand::Back);
        assert_eq!(ShellCommand::parse("previous").unwrap(), ShellCommand::Back);
        assert_eq!(ShellCommand::parse("quit").unwrap(), ShellCommand::Exit);
        assert!(ShellCommand::parse("jump").is_err());
        assert!(ShellCommand::parse("   ").is_err());
    }
}
