//! 基础设施层 - 技术实现
//!
//! 提供配置加载等技术实现

pub mod config;

pub use config::{EngineConfig, HelperConfig};
