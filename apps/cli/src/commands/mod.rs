//! 命令定义和实现

pub mod config;
pub mod driver;
pub mod nav_goal;

pub use config::{CliConfig, ConfigCommand};
pub use driver::DriverCommand;
pub use nav_goal::NavGoalCommand;
