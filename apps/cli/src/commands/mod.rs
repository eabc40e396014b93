//! 命令定义和实现

pub mod config;
pub mod send;
pub mod sim;
pub mod status;

pub use config::ConfigCommand;
pub use send::SendCommand;
pub use sim::SimCommand;
pub use status::StatusCommand;
