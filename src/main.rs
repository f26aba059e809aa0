use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use ossbridge::cli::{self, Commands};
use ossbridge::props::OssProperties;
use ossbridge::template::{self, OssTemplate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件
    dotenv().ok();

    env_logger::init();
    let args = cli::Cli::parse();

    let props = match &args.config {
        Some(path) => OssProperties::from_toml_file(path)?,
        None => OssProperties::from_env()?,
    };
    let oss = template::build_alioss_template(props)?;

    match args.command {
        Commands::MakeBucket { bucket } => {
            oss.make_bucket(&bucket).await?;
            println!("Bucket {} is ready", bucket);
        }
        Commands::RemoveBucket { bucket } => {
            oss.remove_bucket(&bucket).await?;
            println!("Bucket {} removed", bucket);
        }
        Commands::BucketExists { bucket } => {
            let exists = oss.bucket_exists(&bucket).await?;
            println!("{}", exists);
        }
        Commands::Put { file, bucket, name, cover } => {
            let name = match name {
                Some(n) => n,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("cannot derive object name from path")?,
            };
            let mut stream = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("cannot open {}", file.display()))?;

            let stored = oss.put(bucket.as_deref(), &mut stream, &name, cover).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        Commands::Stat { key, bucket } => {
            let meta = oss.stat_file(bucket.as_deref(), &key).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Commands::Copy { bucket, key, dest_bucket, dest_key } => {
            oss.copy_file(&bucket, &key, &dest_bucket, dest_key.as_deref()).await?;
            println!("Copied {}/{} to {}", bucket, key, dest_bucket);
        }
        Commands::Rm { keys, bucket } => {
            oss.remove_files(bucket.as_deref(), &keys).await?;
            println!("Removed {} object(s)", keys.len());
        }
        Commands::Link { key, bucket } => {
            println!("{}", oss.file_link(bucket.as_deref(), &key));
        }
        Commands::Token { bucket, expire } => {
            println!("{}", oss.get_upload_token(bucket.as_deref(), expire)?);
        }
    }

    Ok(())
}
