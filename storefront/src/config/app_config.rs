use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/application.toml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 对外访问地址，用于拼接支付完成/取消的跳转页
    pub public_url: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64, // 秒
    /// 商品表为空时写入示例商品
    pub seed: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: String,
    pub currency: String,
    pub payment_method_types: Vec<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub signing_secret: String,
    pub tolerance_secs: u64,
    pub queue_capacity: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
    pub environment: String,
}

impl AppConfig {
    /// 默认值 -> 配置文件（可选） -> APP__ 前缀的环境变量
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.payment.currency.trim().is_empty() {
            return Err(AppError::internal("payment.currency must not be empty"));
        }
        if self.webhook.queue_capacity == 0 {
            return Err(AppError::internal("webhook.queue_capacity must be greater than zero"));
        }

        if !self.is_development() && !self.is_testing() {
            if self.payment.secret_key.is_empty() {
                return Err(AppError::internal("payment.secret_key is required outside development"));
            }
            if self.webhook.signing_secret.is_empty() {
                return Err(AppError::internal("webhook.signing_secret is required outside development"));
            }
        }

        Ok(())
    }

    /// 开发环境下允许缺省的密钥，启动时打印告警
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.payment.secret_key.is_empty() {
            missing.push("payment.secret_key");
        }
        if self.webhook.signing_secret.is_empty() {
            missing.push("webhook.signing_secret");
        }
        missing
    }

    pub fn success_url(&self) -> String {
        self.payment
            .success_url
            .clone()
            .unwrap_or_else(|| format!("{}/success.html", self.server.public_url.trim_end_matches('/')))
    }

    pub fn cancel_url(&self) -> String {
        self.payment
            .cancel_url
            .clone()
            .unwrap_or_else(|| format!("{}/cancel.html", self.server.public_url.trim_end_matches('/')))
    }

    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "development"
    }

    pub fn is_testing(&self) -> bool {
        self.environment.to_lowercase() == "testing"
    }
}

impl PaymentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl WebhookConfig {
    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_secs)
    }
}

impl DatabaseConfig {
    /// 测试用内存库
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://store.db".to_string(),
            max_connections: 1,
            connection_timeout: 5,
            seed: true,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
            secret_key: String::new(),
            currency: "usd".to_string(),
            payment_method_types: vec!["card".to_string()],
            success_url: None,
            cancel_url: None,
            timeout_secs: 10,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            tolerance_secs: 300,
            queue_capacity: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            payment: PaymentConfig::default(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
            environment: "development".to_string(),
        }
    }
}
