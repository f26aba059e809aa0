use thiserror::Error;

#[derive(Error, Debug)]
pub enum OssError {
    /// 存储服务调用失败（网络、鉴权、配额或非成功状态码）
    #[error("Backend request failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("Invalid OSS configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OssError {
    pub fn backend(message: impl Into<String>) -> Self {
        OssError::Backend(message.into().into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OssError::NotFound { .. })
    }
}

impl From<reqwest::Error> for OssError {
    fn from(e: reqwest::Error) -> Self {
        OssError::Backend(Box::new(e))
    }
}

impl From<url::ParseError> for OssError {
    fn from(e: url::ParseError) -> Self {
        OssError::Config(format!("invalid endpoint url: {}", e))
    }
}

impl From<rusty_s3::BucketError> for OssError {
    fn from(e: rusty_s3::BucketError) -> Self {
        OssError::Config(format!("invalid bucket: {}", e))
    }
}
