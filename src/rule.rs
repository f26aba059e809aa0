use chrono::Local;

/// Maps requested bucket and file names to the names written to storage.
pub trait OssRule: Send + Sync {
    fn bucket_name(&self, bucket_name: &str) -> String;

    fn file_name(&self, original_filename: &str) -> String;
}

/// 默认命名规则：租户前缀的 bucket，按日期分目录的随机文件名
#[derive(Debug, Clone, Default)]
pub struct DefaultOssRule {
    tenant_prefix: Option<String>,
}

impl DefaultOssRule {
    pub fn new(tenant_mode: bool, tenant_id: Option<&str>) -> Self {
        let tenant_prefix = match tenant_id {
            Some(id) if tenant_mode && !id.trim().is_empty() => Some(format!("{}-", id.trim())),
            _ => None,
        };
        Self { tenant_prefix }
    }
}

impl OssRule for DefaultOssRule {
    fn bucket_name(&self, bucket_name: &str) -> String {
        match &self.tenant_prefix {
            Some(prefix) => format!("{}{}", prefix, bucket_name),
            None => bucket_name.to_string(),
        }
    }

    fn file_name(&self, original_filename: &str) -> String {
        format!(
            "upload/{}/{:032x}.{}",
            Local::now().format("%Y%m%d"),
            rand::random::<u128>(),
            file_extension(original_filename)
        )
    }
}

fn file_extension(file_name: &str) -> &str {
    // 只看最后一段路径
    let file_name = file_name.rsplit('/').next().unwrap_or(file_name);
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx + 1..],
        None => "",
    }
}
