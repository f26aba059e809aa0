use crate::Result;
use crate::error::OssError;
use crate::models::{ObjectMetadata, PutObjectResult};
use crate::policy::{self, PolicyConditions};
use crate::props::OssProperties;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use quick_xml::de::from_str;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, LAST_MODIFIED};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

// 预签名 URL 的有效期
const SIGN_DURATION: Duration = Duration::from_secs(3600);

// Characters left as-is in an object key; `/` keeps the key's path shape.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The vendor SDK seam. Everything below this trait talks to the storage
/// service; everything above it only composes names and links.
#[async_trait]
pub trait OssClient: Send + Sync {
    async fn create_bucket(&self, bucket_name: &str) -> Result<()>;

    async fn delete_bucket(&self, bucket_name: &str) -> Result<()>;

    async fn does_bucket_exist(&self, bucket_name: &str) -> Result<bool>;

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()>;

    /// Fails with [`OssError::NotFound`] when the object is absent.
    async fn get_object_metadata(&self, bucket_name: &str, key: &str) -> Result<ObjectMetadata>;

    /// Reads `stream` to its end and uploads the bytes as one object.
    async fn put_object(
        &self,
        bucket_name: &str,
        key: &str,
        stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<PutObjectResult>;

    async fn delete_object(&self, bucket_name: &str, key: &str) -> Result<()>;

    fn generate_post_policy(&self, expiration: DateTime<Utc>, conditions: &PolicyConditions) -> String;

    fn calculate_post_signature(&self, post_policy: &str) -> Result<String>;
}

// 自定义结构体用于解析 XML 错误响应
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// [`OssClient`] over the S3 compatible REST API: requests are presigned with
/// rusty-s3 and sent with one shared reqwest client.
pub struct S3OssClient {
    endpoint: url::Url,
    region: String,
    credentials: Credentials,
    client: ReqwestClient,
}

impl S3OssClient {
    pub fn new(props: &OssProperties) -> Result<Self> {
        props.validate()?;

        // 确保有 http(s):// 前缀
        let base_url = if !props.endpoint.starts_with("http://") && !props.endpoint.starts_with("https://") {
            format!("https://{}", props.endpoint)
        } else {
            props.endpoint.clone()
        };
        let base_url = base_url.trim_end_matches('/');
        let endpoint = url::Url::parse(base_url)?;
        debug!("OSS endpoint resolved to {}", endpoint);

        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(props.request_timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            region: props.region.clone(),
            credentials: Credentials::new(props.access_key.clone(), props.secret_key.clone()),
            client,
        })
    }

    fn bucket(&self, bucket_name: &str) -> Result<Bucket> {
        Ok(Bucket::new(
            self.endpoint.clone(),
            UrlStyle::VirtualHost,
            bucket_name.to_string(),
            self.region.clone(),
        )?)
    }
}

#[async_trait]
impl OssClient for S3OssClient {
    async fn create_bucket(&self, bucket_name: &str) -> Result<()> {
        let bucket = self.bucket(bucket_name)?;
        let url = bucket.create_bucket(&self.credentials).sign(SIGN_DURATION);
        debug!("PUT bucket {}", bucket_name);

        let response = self.client.put(url).body(Vec::new()).send().await?;
        ensure_success(response, &format!("create bucket {}", bucket_name)).await?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket_name: &str) -> Result<()> {
        let bucket = self.bucket(bucket_name)?;
        let url = bucket.delete_bucket(&self.credentials).sign(SIGN_DURATION);
        debug!("DELETE bucket {}", bucket_name);

        let response = self.client.delete(url).send().await?;
        ensure_success(response, &format!("delete bucket {}", bucket_name)).await?;
        Ok(())
    }

    async fn does_bucket_exist(&self, bucket_name: &str) -> Result<bool> {
        let bucket = self.bucket(bucket_name)?;
        // 列出最多一个对象来探测 bucket 是否存在
        let mut action = bucket.list_objects_v2(Some(&self.credentials));
        action.query_mut().insert("max-keys", "1");
        let url = action.sign(SIGN_DURATION);
        debug!("GET bucket {} (existence probe)", bucket_name);

        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        ensure_success(response, &format!("probe bucket {}", bucket_name)).await?;
        Ok(true)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<()> {
        let bucket = self.bucket(dest_bucket)?;
        let source = copy_source(src_bucket, src_key);

        let mut action = bucket.put_object(Some(&self.credentials), dest_key);
        action.headers_mut().insert("x-amz-copy-source", source.clone());
        let url = action.sign(SIGN_DURATION);
        debug!("COPY {} -> {}/{}", source, dest_bucket, dest_key);

        let response = self
            .client
            .put(url)
            .header("x-amz-copy-source", source)
            .body(Vec::new())
            .send()
            .await?;
        ensure_success(
            response,
            &format!("copy {}/{} to {}/{}", src_bucket, src_key, dest_bucket, dest_key),
        )
        .await?;
        Ok(())
    }

    async fn get_object_metadata(&self, bucket_name: &str, key: &str) -> Result<ObjectMetadata> {
        let bucket = self.bucket(bucket_name)?;
        let url = bucket.head_object(Some(&self.credentials), key).sign(SIGN_DURATION);
        debug!("HEAD {}/{}", bucket_name, key);

        let response = self.client.head(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(OssError::NotFound {
                bucket: bucket_name.to_string(),
                key: key.to_string(),
            });
        }
        let response = ensure_success(response, &format!("stat {}/{}", bucket_name, key)).await?;
        Ok(object_metadata(response.headers()))
    }

    async fn put_object(
        &self,
        bucket_name: &str,
        key: &str,
        stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<PutObjectResult> {
        let mut body = Vec::new();
        stream.read_to_end(&mut body).await?;

        let bucket = self.bucket(bucket_name)?;
        let url = bucket.put_object(Some(&self.credentials), key).sign(SIGN_DURATION);
        debug!("PUT {}/{} ({} bytes)", bucket_name, key, body.len());

        let response = self.client.put(url).body(body).send().await?;
        let response = ensure_success(response, &format!("upload {}/{}", bucket_name, key)).await?;

        Ok(PutObjectResult {
            etag: header_string(response.headers(), ETAG.as_str()),
        })
    }

    async fn delete_object(&self, bucket_name: &str, key: &str) -> Result<()> {
        let bucket = self.bucket(bucket_name)?;
        let url = bucket.delete_object(Some(&self.credentials), key).sign(SIGN_DURATION);
        debug!("DELETE {}/{}", bucket_name, key);

        let response = self.client.delete(url).send().await?;
        ensure_success(response, &format!("delete {}/{}", bucket_name, key)).await?;
        Ok(())
    }

    fn generate_post_policy(&self, expiration: DateTime<Utc>, conditions: &PolicyConditions) -> String {
        policy::generate_post_policy(expiration, conditions)
    }

    fn calculate_post_signature(&self, post_policy: &str) -> Result<String> {
        policy::calculate_post_signature(self.credentials.secret(), post_policy)
    }
}

fn copy_source(bucket_name: &str, key: &str) -> String {
    format!("/{}/{}", bucket_name, utf8_percent_encode(key, KEY_ENCODE_SET))
}

async fn ensure_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let content = response.text().await.unwrap_or_default();
    Err(OssError::backend(describe_failure(context, status, &content)))
}

fn describe_failure(context: &str, status: StatusCode, content: &str) -> String {
    match from_str::<ErrorResponse>(content) {
        Ok(err) if !err.code.is_empty() => {
            format!("Failed to {}: {} {}: {}", context, status, err.code, err.message)
        }
        _ => format!("Failed to {}: {}", context, status),
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').to_string())
}

fn object_metadata(headers: &HeaderMap) -> ObjectMetadata {
    ObjectMetadata {
        content_md5: header_string(headers, "content-md5"),
        content_length: header_string(headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        last_modified: header_string(headers, LAST_MODIFIED.as_str())
            .and_then(|v| DateTime::parse_from_rfc2822(&v).ok())
            .map(|d| d.with_timezone(&Utc)),
        content_type: header_string(headers, CONTENT_TYPE.as_str()),
        etag: header_string(headers, ETAG.as_str()),
    }
}
