use clap::Parser;
use fxtrader::config::parse_instruments;
use fxtrader::feed::{MarketScenario, SyntheticQuoteFeed};
use fxtrader::gateway::{shared, PaperGateway};
use fxtrader::{Result, StrategyConfig, StrategyController};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fxtrader")]
#[command(about = "EWMA crossover trader running against a paper broker")]
struct Args {
    /// Strategy config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Instruments to trade, e.g. EURUSD:0.01,USDJPY:0.01
    #[arg(long)]
    symbols: Option<String>,

    /// Seconds between poll cycles
    #[arg(long)]
    delay: Option<f64>,

    /// Broker server offset from GMT, in hours
    #[arg(long)]
    broker_gmt: Option<i64>,

    /// Run time in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Synthetic market scenario: uptrend, downtrend, sideways, volatile
    #[arg(long, default_value = "volatile")]
    scenario: MarketScenario,

    /// Milliseconds between synthetic ticks
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Seed for the synthetic feed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log gateway responses and classifier tallies
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = build_config(&args)?;
    config.validate()?;

    tracing::info!("🚀 {} starting", config.name);
    tracing::info!("  Instruments: {}", config.symbols().join(", "));
    tracing::info!("  Poll delay: {:?}", config.poll_delay());
    tracing::info!("  Broker GMT offset: {}h", config.broker_gmt_offset_hours);
    tracing::info!("  Scenario: {:?} (seed {})", args.scenario, args.seed);

    let gateway = shared(PaperGateway::new(config.broker_gmt_offset_hours));
    let mut controller = StrategyController::new(config.clone(), gateway.clone());
    controller.run().await?;

    let (feed_open, feed_rx) = watch::channel(true);
    let feed = SyntheticQuoteFeed::new(args.seed, args.scenario, config.broker_gmt_offset_hours);
    let feed_task = tokio::spawn(feed.run(
        gateway.clone(),
        config.symbols(),
        Duration::from_millis(args.tick_ms.max(1)),
        feed_rx,
    ));

    if args.duration > 0 {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
            }
            _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {
                tracing::info!("Run time elapsed, shutting down...");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
        tracing::info!("⚠️  Received Ctrl+C, shutting down...");
    }

    feed_open.send_replace(false);
    let report = controller.stop().await?;
    if let Err(e) = feed_task.await {
        tracing::warn!("Synthetic feed task failed: {}", e);
    }

    tracing::info!("\n📊 Session Summary:");
    for (symbol, stats) in &report.workers {
        tracing::info!(
            "  {} | cycles {} | ticks {} | signals {} | opened {} | closed {} | vetoes {} | failures {}",
            symbol,
            stats.cycles,
            stats.ticks,
            stats.signals,
            stats.opened,
            stats.closed,
            stats.vetoes,
            stats.failures
        );
    }
    tracing::info!("  Residual positions closed: {}", report.residual_closed);

    tracing::info!("👋 {} stopped", config.name);
    Ok(())
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "fxtrader=debug"
    } else {
        "fxtrader=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn build_config(args: &Args) -> Result<StrategyConfig> {
    let mut config = StrategyConfig::load(args.config.as_deref())?;

    if let Some(symbols) = &args.symbols {
        config.instruments = parse_instruments(symbols)?;
    }
    if let Some(delay) = args.delay {
        config.poll_delay_secs = delay;
    }
    if let Some(offset) = args.broker_gmt {
        config.broker_gmt_offset_hours = offset;
    }
    config.verbose |= args.verbose;

    Ok(config)
}
