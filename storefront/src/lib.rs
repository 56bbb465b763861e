pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repositories;
pub mod services;
pub mod utils;

// 重新导出关键组件，便于集成测试和二进制入口调用
pub use app_state::AppState;
pub use config::AppConfig;
pub use error::AppError;
