// src/main.rs
use anyhow::{Context, Result};
use bitvavo_scalper::config::{RuntimeSettings, ScalperConfig};
use bitvavo_scalper::connectors::bitvavo::BitvavoClient;
use bitvavo_scalper::connectors::feed::{PriceCache, TickerFeed};
use bitvavo_scalper::connectors::traits::ExchangeClient;
use bitvavo_scalper::core::engine::{TradingEngine, VERSION};
use bitvavo_scalper::core::journal::TradeJournal;
use bitvavo_scalper::core::portfolio::PortfolioStore;
use bitvavo_scalper::core::status::shared_status;
use bitvavo_scalper::notify::slack::SlackNotifier;
use bitvavo_scalper::notify::Notifier;
use bitvavo_scalper::strategies::scalper::ScalpingStrategy;
use bitvavo_scalper::{logging, report, server};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bitvavo-scalper", version)]
#[command(about = "Async scalping bot for Bitvavo with dynamic stoploss and risk sizing", long_about = None)]
struct Cli {
    /// Path to JSON config file
    #[arg(short, long, default_value = "scalper.json")]
    config: PathBuf,

    /// Directory for portfolio.json, trades.json and logs
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Port for /health and /status
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    http_port: u16,

    /// Poll prices over REST only, without the WebSocket ticker feed
    #[arg(long)]
    no_stream: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the trading bot
    Run,
    /// Load and validate the config, then print the effective values
    CheckConfig,
    /// Print realized profit per day and pair from trades.json
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => {
            let _guard = logging::init(None);
            check_config(&cli)
        }
        Some(Commands::Report) => {
            let _guard = logging::init(None);
            print_report(&cli).await
        }
        Some(Commands::Run) | None => run(cli).await,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let _guard = logging::init(Some(&cli.data_dir.join("logs")));

    let config = ScalperConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let settings = RuntimeSettings::from_env();
    if !config.demo_mode {
        settings.require_credentials()?;
    }
    let bot_name = settings.bot_name(&config);

    println!("========================================");
    println!("       BITVAVO SCALPER - v{}", VERSION);
    println!("========================================");
    println!("Bot:    {}", bot_name);
    println!("Pairs:  {}", config.pairs.join(", "));
    println!(
        "Mode:   {}",
        if config.demo_mode {
            "📝 DEMO TRADING"
        } else {
            "🚨 LIVE TRADING"
        }
    );
    println!("========================================");

    info!(
        bot = %bot_name,
        config = %cli.config.display(),
        data_dir = %cli.data_dir.display(),
        "config loaded"
    );

    let exchange: Arc<dyn ExchangeClient> = Arc::new(BitvavoClient::new(&settings)?);
    let slack = settings
        .slack_webhook_url
        .clone()
        .map(SlackNotifier::new)
        .transpose()?;
    let notifier = Notifier::new(bot_name, slack);
    let portfolio = PortfolioStore::load(&cli.data_dir).await?;
    let journal = TradeJournal::new(&cli.data_dir);
    let status = shared_status();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let strategy = ScalpingStrategy::new(config.clone());
    let mut engine = TradingEngine::new(
        config.clone(),
        exchange,
        strategy,
        portfolio,
        journal,
        notifier,
    )
    .with_status(status.clone());

    let feed = if cli.no_stream {
        None
    } else {
        let cache = PriceCache::new();
        engine = engine.with_price_cache(cache.clone());
        Some(TickerFeed::new(settings.ws_url.clone(), config.pairs.clone(), cache).spawn(shutdown_rx.clone()))
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.http_port));
    let http = tokio::spawn(server::serve(addr, status, shutdown_rx.clone()));

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let result = engine.run(shutdown_rx).await;

    if let Some(feed) = feed {
        let _ = feed.await;
    }
    match http.await {
        Ok(Err(e)) => error!("HTTP server failed: {:#}", e),
        Err(e) => error!("HTTP server task panicked: {}", e),
        Ok(Ok(())) => {}
    }
    result
}

async fn wait_for_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("🛑 Shutdown requested");
}

fn check_config(cli: &Cli) -> Result<()> {
    let config = ScalperConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    for pair in &config.pairs {
        println!("{pair}: budget {:.2}", config.pair_budget(pair));
    }
    println!("✅ {} is valid", cli.config.display());
    Ok(())
}

async fn print_report(cli: &Cli) -> Result<()> {
    let journal = TradeJournal::new(&cli.data_dir);
    let trades = journal
        .read_all()
        .await
        .with_context(|| format!("reading {}", journal.path().display()))?;
    print!("{}", report::render(&report::daily_profit(&trades)));
    Ok(())
}
