use crate::Result;
use crate::client::{OssClient, S3OssClient};
use crate::error::OssError;
use crate::models::{FileMetadata, StoredFile, UploadToken};
use crate::policy::{self, COND_CONTENT_LENGTH_RANGE, COND_KEY, MatchMode, PolicyConditions};
use crate::props::OssProperties;
use crate::rule::{DefaultOssRule, OssRule};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Key prefix browser uploads are restricted to.
pub const UPLOAD_DIR: &str = "upload";

/// Extra put attempts made while the service returns no entity tag.
pub const PUT_RETRY_COUNT: usize = 5;

/// Storage operations shared by every backend. A `None` bucket means the
/// configured default bucket.
#[async_trait]
pub trait OssTemplate: Send + Sync {
    async fn make_bucket(&self, bucket_name: &str) -> Result<()>;

    async fn remove_bucket(&self, bucket_name: &str) -> Result<()>;

    async fn bucket_exists(&self, bucket_name: &str) -> Result<bool>;

    /// Server-side copy. The destination key defaults to `file_name`.
    async fn copy_file(
        &self,
        bucket_name: &str,
        file_name: &str,
        dest_bucket_name: &str,
        dest_file_name: Option<&str>,
    ) -> Result<()>;

    async fn stat_file(&self, bucket_name: Option<&str>, file_name: &str) -> Result<FileMetadata>;

    fn file_path(&self, bucket_name: Option<&str>, file_name: &str) -> String;

    fn file_link(&self, bucket_name: Option<&str>, file_name: &str) -> String;

    async fn put_file(
        &self,
        bucket_name: Option<&str>,
        file_name: &str,
        stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<StoredFile>;

    async fn remove_file(&self, bucket_name: Option<&str>, file_name: &str) -> Result<()>;

    /// Deletes keys one by one and stops at the first failure.
    async fn remove_files(&self, bucket_name: Option<&str>, file_names: &[String]) -> Result<()>;
}

/// 阿里云 OSS 实现
pub struct AliossTemplate {
    oss_client: Arc<dyn OssClient>,
    oss_properties: OssProperties,
    oss_rule: Arc<dyn OssRule>,
}

impl AliossTemplate {
    pub fn new(oss_client: Arc<dyn OssClient>, oss_properties: OssProperties, oss_rule: Arc<dyn OssRule>) -> Self {
        Self {
            oss_client,
            oss_properties,
            oss_rule,
        }
    }

    pub fn properties(&self) -> &OssProperties {
        &self.oss_properties
    }

    /// 上传文件
    ///
    /// With `cover` the object is written once. Otherwise a response without
    /// an entity tag triggers up to [`PUT_RETRY_COUNT`] more puts with the same
    /// stream; running out of retries is not an error.
    pub async fn put(
        &self,
        bucket_name: Option<&str>,
        stream: &mut (dyn AsyncRead + Unpin + Send),
        key: &str,
        cover: bool,
    ) -> Result<StoredFile> {
        let bucket_name = self.bucket_or_default(bucket_name);
        self.make_bucket(bucket_name).await?;

        let original_name = key.to_string();
        let key = self.oss_rule.file_name(key);
        let bucket = self.get_bucket_name(bucket_name);

        if cover {
            self.oss_client.put_object(&bucket, &key, stream).await?;
        } else {
            // 注意：重试复用同一个流，单次读取的流在重试时只会上传剩余字节
            let mut response = self.oss_client.put_object(&bucket, &key, stream).await?;
            let mut retry = 0;
            while !response.has_etag() && retry < PUT_RETRY_COUNT {
                retry += 1;
                warn!("Upload of {}/{} returned no ETag, retrying ({}/{})", bucket, key, retry, PUT_RETRY_COUNT);
                response = self.oss_client.put_object(&bucket, &key, stream).await?;
            }
        }
        info!("Uploaded {} to {}/{}", original_name, bucket, key);

        Ok(StoredFile {
            original_name,
            domain: self.get_oss_host(Some(bucket_name)),
            link: self.file_link(Some(bucket_name), &key),
            name: key,
        })
    }

    /// Upload token for the default bucket with the configured lifetime.
    pub fn get_default_upload_token(&self) -> Result<String> {
        self.get_upload_token(None, None)
    }

    /// 生成浏览器直传凭证（JSON 字符串）
    pub fn get_upload_token(&self, bucket_name: Option<&str>, expire_time: Option<u64>) -> Result<String> {
        let token = self.upload_token(bucket_name, expire_time)?;
        Ok(serde_json::to_string(&token)?)
    }

    pub fn upload_token(&self, bucket_name: Option<&str>, expire_time: Option<u64>) -> Result<UploadToken> {
        let args = &self.oss_properties.args;
        let expire_time = expire_time.unwrap_or(args.expire_time);

        let out_of_range = || OssError::Config(format!("expire time {} is out of range", expire_time));
        let expire_end_time = i64::try_from(expire_time)
            .ok()
            .and_then(|secs| secs.checked_mul(1000))
            .and_then(|millis| Utc::now().timestamp_millis().checked_add(millis))
            .ok_or_else(out_of_range)?;
        let expiration = Utc
            .timestamp_millis_opt(expire_end_time)
            .single()
            .ok_or_else(out_of_range)?;

        let mut policy_conds = PolicyConditions::new();
        policy_conds
            .add_range(COND_CONTENT_LENGTH_RANGE, 0, args.content_length_range)
            .add_match(MatchMode::StartWith, COND_KEY, UPLOAD_DIR);

        let post_policy = self.oss_client.generate_post_policy(expiration, &policy_conds);
        let encoded_policy = policy::encode_policy(&post_policy);
        let post_signature = self.oss_client.calculate_post_signature(&post_policy)?;
        debug!("Issued upload token expiring at {}", expiration);

        Ok(UploadToken {
            accessid: self.oss_properties.access_key.clone(),
            policy: encoded_policy,
            signature: post_signature,
            dir: UPLOAD_DIR.to_string(),
            host: self.get_oss_host(bucket_name),
            expire: (expire_end_time / 1000).to_string(),
        })
    }

    /// `{scheme}{bucket}.{endpoint without scheme}`
    pub fn get_oss_host(&self, bucket_name: Option<&str>) -> String {
        let endpoint = self.get_endpoint();
        let prefix = if endpoint.contains("https://") { "https://" } else { "http://" };
        format!(
            "{}{}.{}",
            prefix,
            self.get_bucket_name(self.bucket_or_default(bucket_name)),
            endpoint.replacen(prefix, "", 1)
        )
    }

    pub fn get_endpoint(&self) -> &str {
        self.oss_properties.effective_endpoint()
    }

    fn bucket_or_default<'a>(&'a self, bucket_name: Option<&'a str>) -> &'a str {
        bucket_name.unwrap_or(&self.oss_properties.bucket_name)
    }

    fn get_bucket_name(&self, bucket_name: &str) -> String {
        self.oss_rule.bucket_name(bucket_name)
    }
}

#[async_trait]
impl OssTemplate for AliossTemplate {
    async fn make_bucket(&self, bucket_name: &str) -> Result<()> {
        if !self.bucket_exists(bucket_name).await? {
            let bucket = self.get_bucket_name(bucket_name);
            self.oss_client.create_bucket(&bucket).await?;
            info!("Created bucket {}", bucket);
        }
        Ok(())
    }

    async fn remove_bucket(&self, bucket_name: &str) -> Result<()> {
        self.oss_client.delete_bucket(&self.get_bucket_name(bucket_name)).await
    }

    async fn bucket_exists(&self, bucket_name: &str) -> Result<bool> {
        self.oss_client.does_bucket_exist(&self.get_bucket_name(bucket_name)).await
    }

    async fn copy_file(
        &self,
        bucket_name: &str,
        file_name: &str,
        dest_bucket_name: &str,
        dest_file_name: Option<&str>,
    ) -> Result<()> {
        self.oss_client
            .copy_object(
                &self.get_bucket_name(bucket_name),
                file_name,
                &self.get_bucket_name(dest_bucket_name),
                dest_file_name.unwrap_or(file_name),
            )
            .await
    }

    async fn stat_file(&self, bucket_name: Option<&str>, file_name: &str) -> Result<FileMetadata> {
        let bucket = self.get_bucket_name(self.bucket_or_default(bucket_name));
        let stat = self.oss_client.get_object_metadata(&bucket, file_name).await?;

        Ok(FileMetadata {
            name: file_name.to_string(),
            link: self.file_link(bucket_name, file_name),
            hash: stat.content_md5,
            length: stat.content_length,
            put_time: stat.last_modified,
            content_type: stat.content_type,
        })
    }

    fn file_path(&self, bucket_name: Option<&str>, file_name: &str) -> String {
        format!("{}/{}", self.get_oss_host(bucket_name), file_name)
    }

    fn file_link(&self, bucket_name: Option<&str>, file_name: &str) -> String {
        format!("{}/{}", self.get_oss_host(bucket_name), file_name)
    }

    async fn put_file(
        &self,
        bucket_name: Option<&str>,
        file_name: &str,
        stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<StoredFile> {
        self.put(bucket_name, stream, file_name, false).await
    }

    async fn remove_file(&self, bucket_name: Option<&str>, file_name: &str) -> Result<()> {
        let bucket = self.get_bucket_name(self.bucket_or_default(bucket_name));
        self.oss_client.delete_object(&bucket, file_name).await
    }

    async fn remove_files(&self, bucket_name: Option<&str>, file_names: &[String]) -> Result<()> {
        for file_name in file_names {
            self.remove_file(bucket_name, file_name).await?;
        }
        Ok(())
    }
}

/// Builds the template for the backend named in `props.name`.
pub fn build_template(props: OssProperties) -> Result<Arc<dyn OssTemplate>> {
    Ok(build_alioss_template(props)?)
}

/// Same as [`build_template`] but keeps the concrete Aliyun type, which also
/// issues upload tokens.
pub fn build_alioss_template(props: OssProperties) -> Result<Arc<AliossTemplate>> {
    match props.name.to_ascii_lowercase().as_str() {
        "alioss" | "aliyun" => {
            let client = S3OssClient::new(&props)?;
            let rule = DefaultOssRule::new(props.tenant_mode, props.tenant_id.as_deref());
            Ok(Arc::new(AliossTemplate::new(Arc::new(client), props, Arc::new(rule))))
        }
        other => Err(OssError::Config(format!("unsupported oss backend: {}", other))),
    }
}
