use super::test_helpers::*;
use ossbridge::OssError;
use ossbridge::props::OssProperties;
use ossbridge::template::{OssTemplate, PUT_RETRY_COUNT};
use predicates::prelude::*;

fn is_create(call: &Call) -> bool {
    matches!(call, Call::CreateBucket(_))
}

fn is_put(call: &Call) -> bool {
    matches!(call, Call::Put { .. })
}

#[tokio::test]
async fn make_bucket_is_idempotent() {
    let env = TestEnv::new();

    env.oss.make_bucket("photos").await.unwrap();
    assert!(env.oss.bucket_exists("photos").await.unwrap());

    env.oss.make_bucket("photos").await.unwrap();
    assert_eq!(env.client.count(is_create), 1);
}

#[tokio::test]
async fn make_bucket_skips_existing_bucket() {
    let env = TestEnv::new();
    env.client.add_bucket("photos");

    env.oss.make_bucket("photos").await.unwrap();
    assert_eq!(env.client.count(is_create), 0);
}

#[tokio::test]
async fn remove_bucket_deletes_ruled_name() {
    let env = tenant_env();
    env.client.add_bucket("000000-photos");

    env.oss.remove_bucket("photos").await.unwrap();
    assert_eq!(env.client.calls(), vec![Call::DeleteBucket("000000-photos".to_string())]);
    assert!(!env.client.has_bucket("000000-photos"));
}

#[tokio::test]
async fn links_are_pure_string_composition() {
    let env = TestEnv::new();

    let path = env.oss.file_path(Some("photos"), "a/b.png");
    let link = env.oss.file_link(Some("photos"), "a/b.png");
    assert_eq!(path, "https://photos.oss.example.com/a/b.png");
    assert_eq!(path, link);
    assert_eq!(link, env.oss.file_link(Some("photos"), "a/b.png"));

    assert_eq!(env.oss.file_link(None, "x.txt"), "https://media.oss.example.com/x.txt");
    assert!(env.client.calls().is_empty());
}

#[test]
fn oss_host_strips_one_scheme_occurrence() {
    let env = TestEnv::new();
    assert_eq!(env.oss.get_oss_host(Some("photos")), "https://photos.oss.example.com");

    let env = TestEnv::with_props(OssProperties::new("http://oss.internal:9000", "ak", "sk", "media"));
    assert_eq!(env.oss.get_oss_host(None), "http://media.oss.internal:9000");

    // 没有协议前缀时按 http 处理
    let env = TestEnv::with_props(OssProperties::new("oss.example.com", "ak", "sk", "media"));
    assert_eq!(env.oss.get_oss_host(None), "http://media.oss.example.com");
}

#[test]
fn transform_endpoint_overrides_host() {
    let mut props = test_props();
    props.transform_endpoint = Some("https://cdn.example.com".to_string());
    let env = TestEnv::with_props(props);

    assert_eq!(env.oss.get_endpoint(), "https://cdn.example.com");
    assert_eq!(env.oss.get_oss_host(Some("photos")), "https://photos.cdn.example.com");
}

#[test]
fn tenant_rule_prefixes_host_bucket() {
    let env = tenant_env();

    assert_eq!(env.oss.get_oss_host(None), "https://000000-media.oss.example.com");
}

#[tokio::test]
async fn put_file_renames_key_and_creates_bucket() {
    let env = TestEnv::new();
    let mut data: &[u8] = b"hello world";

    let stored = env.oss.put_file(Some("photos"), "hello.txt", &mut data).await.unwrap();

    assert_eq!(stored.original_name, "hello.txt");
    assert_eq!(stored.name, "renamed/hello.txt");
    assert_eq!(stored.domain, "https://photos.oss.example.com");
    assert_eq!(stored.link, "https://photos.oss.example.com/renamed/hello.txt");

    assert!(env.client.has_bucket("photos"));
    assert!(env.client.has_object("photos", "renamed/hello.txt"));
    assert_eq!(env.client.count(is_put), 1);
}

#[tokio::test]
async fn put_file_uses_default_bucket() {
    let env = TestEnv::new();
    let mut data: &[u8] = b"x";

    let stored = env.oss.put_file(None, "x.bin", &mut data).await.unwrap();
    assert_eq!(stored.domain, "https://media.oss.example.com");
    assert!(env.client.has_object(BUCKET, "renamed/x.bin"));
}

#[tokio::test]
async fn default_rule_places_uploads_under_dated_dir() {
    let env = TestEnv::with_props(test_props());
    let mut data: &[u8] = b"png";

    let stored = env.oss.put_file(None, "cat.png", &mut data).await.unwrap();

    let shape = predicate::str::is_match(r"^upload/\d{8}/[0-9a-f]{32}\.png$").unwrap();
    assert!(shape.eval(&stored.name));
    assert!(predicate::str::ends_with(stored.name.as_str()).eval(&stored.link));
}

#[tokio::test]
async fn put_without_etag_retries_five_more_times() {
    let env = TestEnv::with_client(MockOssClient::new().with_empty_etag());
    let mut data: &[u8] = b"payload";

    let stored = env.oss.put(Some("photos"), &mut data, "p.txt", false).await;

    assert!(stored.is_ok(), "exhausted retries must not be an error");
    assert_eq!(env.client.count(is_put), 1 + PUT_RETRY_COUNT);
}

#[tokio::test]
async fn put_retries_reuse_the_consumed_stream() {
    // 单次读取的流：第一次上传后已读尽，后续重试上传的是空内容
    let env = TestEnv::with_client(MockOssClient::new().with_empty_etag());
    let mut data: &[u8] = b"payload";

    env.oss.put(Some("photos"), &mut data, "p.txt", false).await.unwrap();

    let sizes: Vec<usize> = env
        .client
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Put { bytes, .. } => Some(bytes),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![7, 0, 0, 0, 0, 0]);
}

#[tokio::test]
async fn cover_put_never_retries() {
    let env = TestEnv::with_client(MockOssClient::new().with_empty_etag());
    let mut data: &[u8] = b"payload";

    env.oss.put(Some("photos"), &mut data, "p.txt", true).await.unwrap();
    assert_eq!(env.client.count(is_put), 1);
}

#[tokio::test]
async fn stat_file_reports_metadata() {
    let env = TestEnv::new();
    env.client.add_object("photos", "docs/a.txt", b"12345");

    let meta = env.oss.stat_file(Some("photos"), "docs/a.txt").await.unwrap();
    assert_eq!(meta.name, "docs/a.txt");
    assert_eq!(meta.link, "https://photos.oss.example.com/docs/a.txt");
    assert_eq!(meta.length, 5);
    assert_eq!(meta.hash.as_deref(), Some("md5-5"));
    assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
    assert!(meta.put_time.is_some());
}

#[tokio::test]
async fn stat_missing_file_is_not_found() {
    let env = TestEnv::new();

    let err = env.oss.stat_file(None, "missing.txt").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, OssError::NotFound { ref bucket, ref key } if bucket == BUCKET && key == "missing.txt"));
}

#[tokio::test]
async fn copy_file_defaults_destination_key() {
    let env = TestEnv::new();
    env.client.add_object("src", "a.txt", b"abc");

    env.oss.copy_file("src", "a.txt", "dst", None).await.unwrap();
    env.oss.copy_file("src", "a.txt", "dst", Some("b.txt")).await.unwrap();

    assert!(env.client.has_object("dst", "a.txt"));
    assert!(env.client.has_object("dst", "b.txt"));
    assert_eq!(
        env.client.calls()[0],
        Call::Copy {
            src: "src/a.txt".to_string(),
            dest: "dst/a.txt".to_string(),
        }
    );
}

#[tokio::test]
async fn remove_file_deletes_from_default_bucket() {
    let env = TestEnv::new();
    env.client.add_object(BUCKET, "old.txt", b"1");

    env.oss.remove_file(None, "old.txt").await.unwrap();
    assert!(!env.client.has_object(BUCKET, "old.txt"));
}

#[tokio::test]
async fn remove_files_stops_at_first_failure() {
    let env = TestEnv::new();
    for key in ["a", "b", "c"] {
        env.client.add_object("photos", key, b"1");
    }
    env.client.fail_delete_of("photos/b");

    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let err = env.oss.remove_files(Some("photos"), &keys).await.unwrap_err();

    assert!(matches!(err, OssError::Backend(_)));
    assert!(!env.client.has_object("photos", "a"));
    assert!(env.client.has_object("photos", "c"));
    assert_eq!(
        env.client.calls(),
        vec![Call::Delete("photos/a".to_string()), Call::Delete("photos/b".to_string())]
    );
}

#[tokio::test]
async fn templates_are_usable_as_trait_objects() {
    let env = TestEnv::new();
    let oss: &dyn OssTemplate = &env.oss;
    let mut data: &[u8] = b"dyn";

    oss.put_file(None, "dyn.txt", &mut data).await.unwrap();
    assert!(oss.bucket_exists(BUCKET).await.unwrap());
}

fn tenant_env() -> TestEnv {
    let mut props = test_props();
    props.tenant_mode = true;
    props.tenant_id = Some("000000".to_string());
    TestEnv::with_props(props)
}

#[tokio::test]
async fn tenant_put_writes_to_prefixed_bucket() {
    let env = tenant_env();
    let mut data: &[u8] = b"tenant";

    let stored = env.oss.put_file(Some("photos"), "t.txt", &mut data).await.unwrap();

    assert_eq!(stored.domain, "https://000000-photos.oss.example.com");
    assert_eq!(stored.link, format!("https://000000-photos.oss.example.com/{}", stored.name));
    assert_eq!(
        env.client.calls(),
        vec![
            Call::BucketExists("000000-photos".to_string()),
            Call::CreateBucket("000000-photos".to_string()),
            Call::Put {
                object: object_id("000000-photos", &stored.name),
                bytes: 6,
            },
        ]
    );
    assert!(env.client.has_object("000000-photos", &stored.name));
}

#[tokio::test]
async fn tenant_remove_files_prefixes_bucket_once() {
    let env = tenant_env();
    env.client.add_object("000000-photos", "a", b"1");
    env.client.add_object("000000-photos", "b", b"1");

    let keys = vec!["a".to_string(), "b".to_string()];
    env.oss.remove_files(Some("photos"), &keys).await.unwrap();

    assert_eq!(
        env.client.calls(),
        vec![
            Call::Delete("000000-photos/a".to_string()),
            Call::Delete("000000-photos/b".to_string()),
        ]
    );
    assert!(!env.client.has_object("000000-photos", "a"));
    assert!(!env.client.has_object("000000-photos", "b"));
}

#[tokio::test]
async fn tenant_remove_file_uses_prefixed_default_bucket() {
    let env = tenant_env();
    env.client.add_object("000000-media", "old.txt", b"1");

    env.oss.remove_file(None, "old.txt").await.unwrap();
    assert_eq!(env.client.calls(), vec![Call::Delete("000000-media/old.txt".to_string())]);
}

#[tokio::test]
async fn tenant_copy_and_stat_address_prefixed_buckets() {
    let env = tenant_env();
    env.client.add_object("000000-src", "a.txt", b"abc");

    env.oss.copy_file("src", "a.txt", "dst", None).await.unwrap();
    let meta = env.oss.stat_file(Some("dst"), "a.txt").await.unwrap();

    assert_eq!(
        env.client.calls(),
        vec![
            Call::Copy {
                src: "000000-src/a.txt".to_string(),
                dest: "000000-dst/a.txt".to_string(),
            },
            Call::Stat("000000-dst/a.txt".to_string()),
        ]
    );
    assert_eq!(meta.length, 3);
    assert_eq!(meta.link, "https://000000-dst.oss.example.com/a.txt");
}

#[tokio::test]
async fn tenant_make_bucket_probes_and_creates_prefixed_name() {
    let env = tenant_env();

    env.oss.make_bucket("photos").await.unwrap();
    env.oss.make_bucket("photos").await.unwrap();

    assert_eq!(env.client.count(is_create), 1);
    assert!(env.client.has_bucket("000000-photos"));
    assert!(!env.client.has_bucket("000000-000000-photos"));
}
