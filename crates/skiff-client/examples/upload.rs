//! Upload a local file to an S3-compatible endpoint.
//!
//! Run with: cargo run --example upload -- <bucket> <key> <file>
//!
//! Configuration:
//!   - SKIFF_ENDPOINT=http://localhost:9000
//!   - SKIFF_ACCESS_KEY
//!   - SKIFF_SECRET_KEY
//!   - SKIFF_REGION (optional)

use std::env;

use skiff_client::{Config, Credentials, SkiffClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let mut args = env::args().skip(1);
    let (bucket, key, file) = match (args.next(), args.next(), args.next()) {
        (Some(b), Some(k), Some(f)) => (b, k, f),
        _ => anyhow::bail!("usage: upload <bucket> <key> <file>"),
    };

    let endpoint =
        env::var("SKIFF_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());
    let access_key = env::var("SKIFF_ACCESS_KEY")?;
    let secret_key = env::var("SKIFF_SECRET_KEY")?;

    let mut config = Config::new(&endpoint)?;
    if let Ok(region) = env::var("SKIFF_REGION") {
        config = config.with_region(region);
    }
    let client = SkiffClient::with_credentials(config, Credentials::new(access_key, secret_key))?;

    if !client.bucket_exists(&bucket).await? {
        client.make_bucket(&bucket, None).await?;
        println!("created bucket {bucket}");
    }

    let total_size = tokio::fs::metadata(&file).await?.len();
    let source = tokio::fs::File::open(&file).await?;

    println!("uploading {file} ({total_size} bytes) to {bucket}/{key}");
    let result = client
        .put_object_stream(&bucket, &key, source, total_size, None)
        .await?;
    println!("done, etag {}", result.etag);

    Ok(())
}
