use crate::error::OssError;
use crate::Result;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const DEFAULT_EXPIRE_TIME: u64 = 3600;
pub const DEFAULT_CONTENT_LENGTH_RANGE: u64 = 10 * 1024 * 1024;

/// Typed replacement for the free-form argument bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OssArgs {
    /// Upload token lifetime in seconds (default: 3600)
    #[serde(default = "default_expire_time")]
    pub expire_time: u64,

    /// Largest object a browser upload may send, in bytes (default: 10 MiB)
    #[serde(default = "default_content_length_range")]
    pub content_length_range: u64,
}

impl Default for OssArgs {
    fn default() -> Self {
        Self {
            expire_time: DEFAULT_EXPIRE_TIME,
            content_length_range: DEFAULT_CONTENT_LENGTH_RANGE,
        }
    }
}

fn default_expire_time() -> u64 {
    DEFAULT_EXPIRE_TIME
}

fn default_content_length_range() -> u64 {
    DEFAULT_CONTENT_LENGTH_RANGE
}

fn default_name() -> String {
    "alioss".to_string()
}

fn default_bucket_name() -> String {
    "bladex".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 对象存储配置，启动时加载一次，之后只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OssProperties {
    /// Backend selector, e.g. `alioss`.
    #[serde(default = "default_name")]
    pub name: String,
    pub endpoint: String,
    /// CDN or internal-network endpoint used for links instead of `endpoint`.
    #[serde(default)]
    pub transform_endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub tenant_mode: bool,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub args: OssArgs,
}

impl OssProperties {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str, bucket_name: &str) -> Self {
        Self {
            name: default_name(),
            endpoint: endpoint.to_string(),
            transform_endpoint: None,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            bucket_name: bucket_name.to_string(),
            region: default_region(),
            tenant_mode: false,
            tenant_id: None,
            request_timeout_secs: default_request_timeout_secs(),
            args: OssArgs::default(),
        }
    }

    /// 从环境变量（含 .env 文件）加载配置
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let required = |key: &str| {
            env::var(key).map_err(|_| OssError::Config(format!("environment variable {} not set", key)))
        };
        let parsed = |key: &str, default: u64| -> Result<u64> {
            match env::var(key) {
                Ok(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| OssError::Config(format!("{} must be an integer, got {:?}", key, v))),
                Err(_) => Ok(default),
            }
        };

        let props = Self {
            name: env::var("OSS_NAME").unwrap_or_else(|_| default_name()),
            endpoint: required("OSS_ENDPOINT")?,
            transform_endpoint: env::var("OSS_TRANSFORM_ENDPOINT").ok(),
            access_key: required("OSS_ACCESS_KEY")?,
            secret_key: required("OSS_SECRET_KEY")?,
            bucket_name: env::var("OSS_BUCKET_NAME").unwrap_or_else(|_| default_bucket_name()),
            region: env::var("OSS_REGION").unwrap_or_else(|_| default_region()),
            tenant_mode: env::var("OSS_TENANT_MODE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            tenant_id: env::var("OSS_TENANT_ID").ok(),
            request_timeout_secs: parsed("OSS_REQUEST_TIMEOUT_SECS", default_request_timeout_secs())?,
            args: OssArgs {
                expire_time: parsed("OSS_EXPIRE_TIME", DEFAULT_EXPIRE_TIME)?,
                content_length_range: parsed("OSS_CONTENT_LENGTH_RANGE", DEFAULT_CONTENT_LENGTH_RANGE)?,
            },
        };
        props.validate()?;
        Ok(props)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let props: Self = toml::from_str(content)
            .map_err(|e| OssError::Config(format!("invalid config: {}", e)))?;
        props.validate()?;
        Ok(props)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OssError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(OssError::Config("endpoint must not be blank".to_string()));
        }
        if self.access_key.trim().is_empty() || self.secret_key.trim().is_empty() {
            return Err(OssError::Config("access key and secret key are required".to_string()));
        }
        if self.bucket_name.trim().is_empty() {
            return Err(OssError::Config("default bucket name must not be blank".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(OssError::Config("request timeout must be at least one second".to_string()));
        }
        Ok(())
    }

    /// Transform endpoint when set and non-blank, otherwise the primary one.
    pub fn effective_endpoint(&self) -> &str {
        match self.transform_endpoint.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.endpoint,
        }
    }
}
