//! 运行模式
//!
//! 单次命令由 `commands` 处理；这里是交互式 Shell。

pub mod repl;
