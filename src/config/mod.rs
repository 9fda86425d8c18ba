//! 配置模块

mod app_config;

pub use app_config::{
    env_lookup, upstream_timeout_from_lookup, AppConfig, ConfigError, GatewayConfig, RelayConfig,
    RelayPipeline,
};
