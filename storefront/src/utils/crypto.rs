use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is missing")]
    MissingHeader,

    #[error("signature header is malformed: {0}")]
    MalformedHeader(String),

    #[error("signature timestamp {timestamp} is outside the {tolerance_secs}s tolerance")]
    TimestampOutOfTolerance { timestamp: i64, tolerance_secs: u64 },

    #[error("no signature matches the payload")]
    Mismatch,

    #[error("invalid signing secret")]
    InvalidKey,

    #[error("webhook signing secret is not configured")]
    MissingSecret,
}

// HMAC-SHA256 签名
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 解析后的 `t=<unix>,v1=<hex>[,v1=<hex>...]` 签名头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| SignatureError::MalformedHeader(format!("unexpected element '{}'", part)))?;

            match key {
                "t" => {
                    let parsed = value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader(format!("bad timestamp '{}'", value)))?;
                    timestamp = Some(parsed);
                }
                "v1" => signatures.push(value.to_string()),
                // v0 等其他方案忽略
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(SignatureError::MalformedHeader("missing v1 signature".to_string()));
        }

        Ok(Self { timestamp, signatures })
    }
}

/// 校验支付回调签名：HMAC-SHA256(secret, "<t>.<payload>")，常量时间比较
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> Result<(), SignatureError> {
        // 未配置密钥时任何人都能用空密钥签名，一律拒绝
        if self.secret.is_empty() {
            return Err(SignatureError::MissingSecret);
        }

        let header = header.ok_or(SignatureError::MissingHeader)?;
        let parsed = SignatureHeader::parse(header)?;

        let tolerance_secs = self.tolerance.as_secs();
        if now.abs_diff(parsed.timestamp) > tolerance_secs {
            return Err(SignatureError::TimestampOutOfTolerance {
                timestamp: parsed.timestamp,
                tolerance_secs,
            });
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched { Ok(()) } else { Err(SignatureError::Mismatch) }
    }

    /// 生成签名头，测试和本地联调时模拟回调使用
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let mut message = format!("{}.", timestamp).into_bytes();
        message.extend_from_slice(payload);
        let signature = hmac_sha256(self.secret.as_bytes(), &message)?;
        Ok(format!("t={},v1={}", timestamp, signature))
    }
}
