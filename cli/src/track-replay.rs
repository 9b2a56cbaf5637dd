use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use lib_seawatch::configs::{load_engine_config, load_filter_groups, load_icon_table};
use lib_seawatch::core::icons::{HttpIconLoader, IconLoader, NoopIconLoader};
use lib_seawatch::core::{maritime_registry, Dispatcher, Engine, StreamEvent};
use lib_seawatch::loggers::{init_tracing, LogOptions};

/// Replays a recorded track stream through the dispatch engine.
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Reads stream events, one JSON object per line, feeds them through the dispatch engine and prints what every layer holds at the end. Lines that fail to parse are logged and skipped."
)]
struct Args {
    /// Path to the recorded stream (JSON lines).
    #[arg(short, long, env = "SEAWATCH_INPUT")]
    input: PathBuf,

    /// Engine configuration file (JSON5).
    #[arg(short, long, env = "SEAWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Custom icon table snapshot applied before the replay starts.
    #[arg(long, env = "SEAWATCH_ICONS")]
    icons: Option<PathBuf>,

    /// Filter group snapshot applied before the replay starts.
    #[arg(long, env = "SEAWATCH_FILTERS")]
    filters: Option<PathBuf>,

    /// Fetch custom icons over HTTP instead of keeping builtin icons.
    #[arg(long)]
    fetch_icons: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, env = "SEAWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Directory for daily JSON log files.
    #[arg(long, env = "SEAWATCH_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let _guard = init_tracing(&LogOptions {
        app_name: "track-replay".to_string(),
        level: args.log_level.clone(),
        log_dir: args.log_dir.clone(),
        ..LogOptions::default()
    })?;

    let config = load_engine_config(args.config.as_deref())?;
    let registry = maritime_registry()?;
    let loader: Arc<dyn IconLoader> = if args.fetch_icons {
        Arc::new(HttpIconLoader::new(config.icon_fetch_timeout()))
    } else {
        Arc::new(NoopIconLoader)
    };
    let (dispatcher, icon_rx) = Dispatcher::new(registry, config.dispatcher_config(), loader);
    let (handle, task) = Engine::spawn(dispatcher, icon_rx, config.stream_buffer());

    if let Some(path) = &args.icons {
        handle.swap_icon_table(load_icon_table(path)?)?;
    }
    if let Some(path) = &args.filters {
        let groups = load_filter_groups(path)?;
        handle
            .send(StreamEvent::FilterTracks {
                groups,
                manual_features: Vec::new(),
            })
            .await?;
    }

    let file = File::open(&args.input)
        .await
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let mut lines = BufReader::new(file).lines();
    let (mut sent, mut skipped, mut line_no) = (0u64, 0u64, 0u64);
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<StreamEvent>(line) {
            Ok(event) => {
                handle.send(event).await?;
                sent += 1;
            }
            Err(e) => {
                log::warn!("Line {}: {}", line_no, e);
                skipped += 1;
            }
        }
    }
    log::info!("Replayed {} events, skipped {} lines", sent, skipped);

    let reported = handle.counts();
    drop(handle);
    let dispatcher = task.await.context("Engine task failed")?;
    let reported = *reported.borrow();

    println!("{:<10} {:>4} {:>8}", "layer", "z", "features");
    for layer in dispatcher.layers() {
        println!(
            "{:<10} {:>4} {:>8}",
            layer.name(),
            layer.z_index(),
            layer.source().len()
        );
    }
    println!("engine: {}", dispatcher.counts());
    println!("stream: {}", reported);
    Ok(())
}
