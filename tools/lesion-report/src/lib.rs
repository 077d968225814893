//! 病灶分割评估命令行工具.

pub mod cli;
pub mod result;
pub mod runner;
