use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 上传成功后返回的文件信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    /// Name the caller asked for.
    pub original_name: String,
    /// Key actually written, after the naming rule.
    pub name: String,
    pub domain: String,
    pub link: String,
}

/// 对象元数据快照，每次调用实时获取
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub link: String,
    pub hash: Option<String>,
    pub length: u64,
    pub put_time: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

/// Browser direct-upload credentials. Field names and order are consumed by
/// front-end clients as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadToken {
    pub accessid: String,
    pub policy: String,
    pub signature: String,
    pub dir: String,
    pub host: String,
    pub expire: String,
}

impl UploadToken {
    pub fn expire_epoch_seconds(&self) -> Option<i64> {
        self.expire.parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectResult {
    pub etag: Option<String>,
}

impl PutObjectResult {
    pub fn has_etag(&self) -> bool {
        self.etag.as_deref().is_some_and(|tag| !tag.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_md5: Option<String>,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}
