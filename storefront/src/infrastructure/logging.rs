use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, registry, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::AppError;

/// 初始化日志。配置了文件路径时额外按天滚动写文件，返回的 guard 需要持有到进程退出
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let formatting_layer = match config.format {
        LogFormat::Json => fmt::layer().json().boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
    };

    let (file_layer, guard) = match &config.file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| AppError::internal(format!("Invalid log file path: {}", file_path)))?;

            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = match config.format {
                LogFormat::Json => fmt::layer().json().with_ansi(false).with_writer(non_blocking).boxed(),
                LogFormat::Pretty => fmt::layer().with_ansi(false).with_writer(non_blocking).boxed(),
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    registry()
        .with(env_filter)
        .with(formatting_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::internal(format!("Failed to initialize logging: {}", e)))?;

    tracing::info!("Logging initialized with level: {}", config.level);

    Ok(guard)
}
