use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tiercache::config::loader::load_config;
use tiercache::{BoxError, CacheValue, TieredCache};

#[derive(Parser)]
#[command(name = "tiercache")]
#[command(about = "Two-tier (local + shared) cache with single-flight loading")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to tiercache.toml when present)
    #[arg(short, long, global = true, env = "TIERCACHE_CONFIG")]
    config: Option<String>,

    /// Log level, overrides logging.level from the configuration
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a key and print its value as JSON
    Get { cache: String, key: String },
    /// Store a JSON value under a key
    Put {
        cache: String,
        key: String,
        /// JSON document, e.g. '{"name":"alice"}'
        value: String,
    },
    /// Remove a key from both tiers
    Evict { cache: String, key: String },
    /// Remove every key of a cache from both tiers
    Clear { cache: String },
    /// Run concurrent get_or_load calls against a slow loader
    Bench(BenchArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
struct BenchArgs {
    /// Cache name
    #[arg(default_value = "bench")]
    cache: String,

    /// Concurrent callers per key
    #[arg(long, default_value_t = 16)]
    callers: usize,

    /// Distinct keys
    #[arg(long, default_value_t = 4)]
    keys: usize,

    /// Simulated loader latency in milliseconds
    #[arg(long, default_value_t = 200)]
    load_ms: u64,
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // --log-level is final; otherwise start at info and switch to
    // logging.level once the configuration is known.
    tiercache::init_tracing(cli.log_level.as_deref().unwrap_or("info"));

    let cfg = load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Configuration error")?;

    if cli.log_level.is_none() {
        tiercache::apply_logging_level(&cfg.logging.level)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Configuration error")?;
    }
    tracing::debug!(backend = %cfg.remote.backend, "configuration loaded");

    if cfg.metrics.enabled {
        tiercache::metrics::init_metrics();
    }

    if let Commands::Config = cli.command {
        let rendered = toml::to_string_pretty(&cfg).context("Failed to render configuration")?;
        print!("{rendered}");
        return Ok(());
    }

    let registry = tiercache::create_registry(&cfg).await;

    match cli.command {
        Commands::Get { cache, key } => {
            let cache = registry.get_cache(&cache);
            match cache.lookup(key.as_str()).await {
                Some(entry) => {
                    let rendered = render_value(&entry.value);
                    println!("{rendered}");
                    tracing::debug!(tier = %entry.tier, "value found");
                }
                None => {
                    eprintln!("(not found)");
                    std::process::exit(3);
                }
            }
        }
        Commands::Put { cache, key, value } => {
            let json: serde_json::Value =
                serde_json::from_str(&value).context("Value must be a JSON document")?;
            registry.get_cache(&cache).put_as(key.as_str(), &json).await?;
            println!("OK");
        }
        Commands::Evict { cache, key } => {
            registry.get_cache(&cache).evict(key.as_str()).await;
            println!("OK");
        }
        Commands::Clear { cache } => {
            registry.get_cache(&cache).clear().await;
            println!("OK");
        }
        Commands::Bench(args) => {
            let cache = registry.get_cache(&args.cache);
            bench(&cache, &args).await?;
        }
        Commands::Config => {}
    }

    if cfg.metrics.enabled {
        for name in registry.cache_names() {
            tiercache::metrics::set_local_entries(&registry.get_cache(&name).stats());
        }
        if let Some(rendered) = tiercache::metrics::render_metrics() {
            eprintln!("{rendered}");
        }
    }

    Ok(())
}

/// Values written by `put` are MessagePack-encoded JSON; anything else is shown
/// as text or a byte count.
fn render_value(value: &CacheValue) -> String {
    if let Ok(json) = value.decode::<serde_json::Value>() {
        return json.to_string();
    }
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<{} bytes>", value.len()),
    }
}

async fn bench(cache: &TieredCache, args: &BenchArgs) -> Result<()> {
    let invocations = Arc::new(AtomicUsize::new(0));
    let load_latency = Duration::from_millis(args.load_ms);

    // Start from a clean slate so the first round really loads.
    cache.clear().await;

    let cold_started = Instant::now();
    let mut tasks = Vec::with_capacity(args.keys * args.callers);
    for k in 0..args.keys {
        for _ in 0..args.callers {
            let cache = cache.clone();
            let invocations = Arc::clone(&invocations);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_load(format!("bench-{k}"), move || async move {
                        invocations.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(load_latency).await;
                        Ok::<_, BoxError>(CacheValue::new(format!("value-{k}").into_bytes()))
                    })
                    .await
            }));
        }
    }
    for task in tasks {
        task.await.context("bench task panicked")??;
    }
    let cold = cold_started.elapsed();

    let warm_started = Instant::now();
    for k in 0..args.keys {
        cache.get(format!("bench-{k}")).await;
    }
    let warm = warm_started.elapsed() / args.keys.max(1) as u32;

    println!("callers per key:    {}", args.callers);
    println!("keys:               {}", args.keys);
    println!("loader invocations: {}", invocations.load(Ordering::SeqCst));
    println!("cold round:         {:?}", cold);
    println!("warm get (avg):     {:?}", warm);
    println!(
        "stats:              {}",
        serde_json::to_string_pretty(&cache.stats())?
    );
    Ok(())
}
