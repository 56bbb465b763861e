use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::error;

use crate::infrastructure::payment::PaymentError;
use crate::utils::crypto::SignatureError;

// 业务错误代码枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // 系统错误 (1xxx)
    InternalServerError = 1000,
    DatabaseError = 1001,
    ConfigError = 1003,

    // 请求错误 (3xxx)
    InvalidParameters = 3001,
    ResourceNotFound = 3002,

    // 业务错误 (4xxx)
    InvalidSignature = 4001,
    ProductNotFound = 4002,
    InvalidQuantity = 4010,

    // 第三方服务错误 (5xxx)
    ChannelApiError = 5000,
    ChannelTimeout = 5001,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InternalServerError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::ConfigError => "Configuration error",

            Self::InvalidParameters => "Invalid parameters",
            Self::ResourceNotFound => "Resource not found",

            Self::InvalidSignature => "Invalid signature",
            Self::ProductNotFound => "Product not found",
            Self::InvalidQuantity => "Invalid quantity",

            Self::ChannelApiError => "Payment provider error",
            Self::ChannelTimeout => "Payment provider timeout",
        }
    }

    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    pub fn as_status_code(&self) -> StatusCode {
        match self {
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::InvalidParameters => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,

            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::ProductNotFound => StatusCode::BAD_REQUEST,
            Self::InvalidQuantity => StatusCode::BAD_REQUEST,

            Self::ChannelApiError => StatusCode::BAD_GATEWAY,
            Self::ChannelTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// 应用错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Payment collaborator error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Webhook verification failed: {0}")]
    Verification(#[from] SignatureError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_quantity(message: impl Into<String>) -> Self {
        Self::InvalidQuantity(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ProductNotFound(_) => ErrorCode::ProductNotFound,
            Self::NotFound(_) => ErrorCode::ResourceNotFound,
            Self::InvalidInput(_) => ErrorCode::InvalidParameters,
            Self::InvalidQuantity(_) => ErrorCode::InvalidQuantity,
            Self::Payment(PaymentError::Timeout(_)) => ErrorCode::ChannelTimeout,
            Self::Payment(_) => ErrorCode::ChannelApiError,
            Self::Verification(_) => ErrorCode::InvalidSignature,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) | Self::Internal(_) => ErrorCode::InternalServerError,
        }
    }

    // 获取错误对应的HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        self.code().as_status_code()
    }

    // 获取用户友好的错误消息，第三方和存储的原始信息只写日志
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(msg) | Self::InvalidInput(msg) | Self::InvalidQuantity(msg) => msg.clone(),
            _ => self.code().as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

// 将AppError转换为Axum响应
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().as_u16().to_string();
        let message = self.user_message();

        // 记录5xx错误，详细信息只出现在日志里
        if status.is_server_error() {
            error!(
                status_code = %status.as_u16(),
                error_code = %code,
                detail = %self,
                "Server error occurred"
            );
        }

        (status, Json(ErrorBody { error: message, code })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{:#}", err))
    }
}
