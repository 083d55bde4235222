mod app;
mod config;

use anyhow::{Context, Result};
use clap::Parser;

use app::Cli;
use config::{QueriesConfig, collect_queries};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    let file_config = cli
        .file
        .as_deref()
        .map(|path| {
            QueriesConfig::load(path)
                .with_context(|| format!("Config: Failed to load queries from {:?}", path))
        })
        .transpose()?;

    let queries = collect_queries(&cli.queries, file_config);
    if queries.is_empty() {
        anyhow::bail!("CLI: No queries given; pass them as arguments or with --file");
    }
    tracing::info!(
        "Compiling {} queries ({} from arguments)",
        queries.len(),
        cli.queries.len()
    );

    let start = std::time::Instant::now();
    let failed = app::run(&queries, cli.format)?;

    tracing::info!(
        "Done! Compiled {} queries in {:.3}ms ({} failed)",
        queries.len(),
        start.elapsed().as_secs_f64() * 1000.0,
        failed
    );

    if failed > 0 {
        anyhow::bail!("{} of {} queries failed to compile", failed, queries.len());
    }

    Ok(())
}
