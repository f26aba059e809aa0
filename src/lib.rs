//! Uniform object storage template with an Aliyun OSS backend.
//!
//! Callers hold an [`OssTemplate`](template::OssTemplate) built from
//! [`OssProperties`](props::OssProperties); the backend behind it is picked by
//! the configured name and reached through an [`OssClient`](client::OssClient).

pub mod cli;
pub mod client;
pub mod error;
pub mod models;
pub mod policy;
pub mod props;
pub mod rule;
pub mod template;

pub use error::OssError;

pub type Result<T> = std::result::Result<T, OssError>;
