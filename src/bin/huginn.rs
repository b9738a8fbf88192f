//! huginn: image resolution CLI
//!
//! Resolve images by id or URL through the shared on-disk cache, and
//! inspect or clear that cache.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

use huginn::cache::{ByteCache, ByteCacheConfig};
use huginn::service::resolve_cache_dir;
use huginn::{
    CachePolicy, Config, FsByteStore, Huginn, HuginnError, HttpByteFetcher, ImageService,
    LoadingState, MetadataFetcher, ResourceMetadata, ResourceRef, RetryPolicy,
};

/// Huginn image resolver
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Resolve remote images through a local cache")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image API base URL (overrides the config file).
    #[arg(long, env = "HUGINN_BASE_URL")]
    base_url: Option<String>,

    /// Persistent cache directory (overrides the config file).
    #[arg(long, env = "HUGINN_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an image and print its dimensions
    Fetch {
        /// Image URL, or image id with --id
        source: String,
        /// Treat SOURCE as an image id
        #[arg(long)]
        id: bool,
        /// Save the decoded image (format from extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Cache policy
        #[arg(short, long, value_enum)]
        policy: Option<PolicyArg>,
        /// Retry with exponential backoff up to N times
        #[arg(short, long)]
        retries: Option<u32>,
    },

    /// Print the metadata record for an image id
    Metadata {
        /// Image id
        id: String,
    },

    /// Inspect or clear the on-disk cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print the size of the on-disk image cache
    Size,
    /// Delete cached data
    Clear {
        /// Only the metadata cache
        #[arg(long, conflicts_with = "images")]
        metadata: bool,
        /// Only the image cache
        #[arg(long)]
        images: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    All,
    MetadataOnly,
    ImageOnly,
    None,
}

impl From<PolicyArg> for CachePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::All => CachePolicy::All,
            PolicyArg::MetadataOnly => CachePolicy::MetadataOnly,
            PolicyArg::ImageOnly => CachePolicy::ImageOnly,
            PolicyArg::None => CachePolicy::None,
        }
    }
}

/// Stand-in used when no API base URL is configured; URL sources still work.
struct NoMetadataApi;

#[async_trait]
impl MetadataFetcher for NoMetadataApi {
    fn name(&self) -> &str {
        "none"
    }

    async fn fetch(&self, _id: &str) -> huginn::Result<ResourceMetadata> {
        Err(HuginnError::Configuration(
            "no API base URL configured (set --base-url or [api] base_url)".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = Some(base_url);
    }
    if let Some(dir) = args.cache_dir {
        config.cache.directory = Some(dir);
    }

    match args.command {
        Command::Fetch {
            source,
            id,
            output,
            policy,
            retries,
        } => {
            let service = build_service(&config)?;
            let source = if id {
                ResourceRef::id(source)
            } else {
                match Url::parse(&source) {
                    Ok(url) => ResourceRef::url(url),
                    Err(_) => ResourceRef::url_string(source),
                }
            };

            let mut options = service.default_options();
            if let Some(policy) = policy {
                options = options.cache_policy(policy.into());
            }
            if let Some(n) = retries {
                options = options.retry_policy(RetryPolicy::exponential(n));
            }

            match service.resolve(source, options).await {
                LoadingState::Success(resource) => {
                    println!("{}x{}", resource.width(), resource.height());
                    if let Some(path) = output {
                        resource.image().save(&path)?;
                        println!("saved to {}", path.display());
                    }
                }
                LoadingState::Failure(error) => {
                    eprintln!("{}: {error}", error.user_message());
                    std::process::exit(1);
                }
                other => {
                    eprintln!("unexpected state: {other:?}");
                    std::process::exit(1);
                }
            }
        }

        Command::Metadata { id } => {
            let service = build_service(&config)?;
            match service.metadata(&id).await {
                Ok(metadata) => println!("{}", serde_json::to_string_pretty(&metadata)?),
                Err(error) => {
                    eprintln!("{}: {error}", error.user_message());
                    std::process::exit(1);
                }
            }
        }

        Command::Cache { command } => {
            let cache = disk_cache(&config);
            match command {
                CacheCommand::Size => {
                    println!("{} bytes", cache.size_on_disk().await);
                }
                CacheCommand::Clear { metadata, images } => {
                    if metadata {
                        println!("metadata cache is held in memory only; nothing to clear");
                    }
                    if images || !metadata {
                        cache.clear_all().await;
                        println!("cleared image cache");
                    }
                }
            }
        }
    }

    Ok(())
}

fn build_service(config: &Config) -> huginn::Result<ImageService> {
    let mut builder = Huginn::builder().from_config(config);
    if config.api.base_url.is_none() {
        let timeout = std::time::Duration::from_secs(config.api.timeout_secs);
        builder = builder
            .metadata_fetcher(Arc::new(NoMetadataApi))
            .byte_fetcher(Arc::new(HttpByteFetcher::with_timeout(timeout)?));
    }
    builder.build()
}

fn disk_cache(config: &Config) -> ByteCache {
    let store = FsByteStore::new(resolve_cache_dir(config.cache.directory.clone()));
    let byte_config = ByteCacheConfig::new()
        .count_limit(config.cache.memory_count_limit)
        .cost_limit(config.cache.memory_cost_limit)
        .disk_quality(config.cache.disk_quality);
    ByteCache::new(&byte_config, Arc::new(store))
}
