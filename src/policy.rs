//! Browser POST upload policy documents and their signatures.
//!
//! The policy is a JSON document `{"expiration": ..., "conditions": [...]}`.
//! The form carries it base64-encoded, and the signature is
//! `base64(HMAC-SHA1(secret_key, base64(policy)))`.

use crate::Result;
use crate::error::OssError;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha1::Sha1;

pub const COND_CONTENT_LENGTH_RANGE: &str = "content-length-range";
pub const COND_KEY: &str = "key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    StartWith,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Range { name: String, min: u64, max: u64 },
    Match { mode: MatchMode, name: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConditions {
    conditions: Vec<Condition>,
}

impl PolicyConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_range(&mut self, name: &str, min: u64, max: u64) -> &mut Self {
        self.conditions.push(Condition::Range {
            name: name.to_string(),
            min,
            max,
        });
        self
    }

    pub fn add_match(&mut self, mode: MatchMode, name: &str, value: &str) -> &mut Self {
        self.conditions.push(Condition::Match {
            mode,
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    fn to_json(&self) -> Vec<Value> {
        self.conditions
            .iter()
            .map(|c| match c {
                Condition::Range { name, min, max } => json!([name, min, max]),
                Condition::Match { mode, name, value } => {
                    let op = match mode {
                        MatchMode::Exact => "eq",
                        MatchMode::StartWith => "starts-with",
                    };
                    json!([op, format!("${}", name), value])
                }
            })
            .collect()
    }
}

/// Renders the policy JSON for the given expiration instant.
pub fn generate_post_policy(expiration: DateTime<Utc>, conditions: &PolicyConditions) -> String {
    json!({
        "expiration": expiration.to_rfc3339_opts(SecondsFormat::Millis, true),
        "conditions": conditions.to_json(),
    })
    .to_string()
}

pub fn encode_policy(post_policy: &str) -> String {
    general_purpose::STANDARD.encode(post_policy.as_bytes())
}

pub fn calculate_post_signature(secret_key: &str, post_policy: &str) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| OssError::Config(format!("unusable secret key: {}", e)))?;
    mac.update(encode_policy(post_policy).as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}
