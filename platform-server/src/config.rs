use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// 环境变量前缀，例如 `PLATFORM_HTTP_PORT`
const ENV_PREFIX: &str = "PLATFORM";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub quic_host: String,
    pub quic_port: u16,
    pub http_host: String,
    pub http_port: u16,
    pub log_level: String,
    /// 单条设备消息的最大字节数
    pub max_message_size: usize,
    pub idle_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quic_host: "0.0.0.0".to_string(),
            quic_port: 8443, // QUIC端口
            http_host: "0.0.0.0".to_string(),
            http_port: 8080, // HTTP端口
            log_level: "info".to_string(),
            max_message_size: 1024 * 1024, // 1MB
            idle_timeout_secs: 300,
        }
    }
}

impl Config {
    /// 默认配置，可由 `PLATFORM_*` 环境变量覆盖
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            ::config::Config::builder().add_source(Environment::with_prefix(ENV_PREFIX)),
        )
    }

    /// 在给定来源之下补齐默认值
    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let settings = builder
            .set_default("quic_host", defaults.quic_host)?
            .set_default("quic_port", i64::from(defaults.quic_port))?
            .set_default("http_host", defaults.http_host)?
            .set_default("http_port", i64::from(defaults.http_port))?
            .set_default("log_level", defaults.log_level)?
            .set_default("max_message_size", defaults.max_message_size as i64)?
            .set_default("idle_timeout_secs", defaults.idle_timeout_secs as i64)?
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_message_size == 0 {
            return Err(ConfigError::Message(
                "max_message_size must be greater than 0".to_string(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn quic_addr(&self) -> String {
        format!("{}:{}", self.quic_host, self.quic_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
