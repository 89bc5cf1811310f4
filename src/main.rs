use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stockpulse::cache::CacheStore;
use stockpulse::news::refresh_board;
use stockpulse::{
    AppConfig, AppState, Coefficients, DailySchedule, FetchJournal, Fetcher, KeywordScorer,
    NewsBoard, NewsScanner, PredictionRunner, PriceService, ProviderClient, PulseError, Scheduler,
};

#[derive(Debug, Parser)]
#[command(name = "stockpulse", version, about = "Cached stock prices, scored news and predictions over HTTP")]
struct Cli {
    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server with the daily news job (default)
    Serve,
    /// Scan the news feed once and print the top articles
    ScanNews {
        #[arg(long, default_value_t = 3)]
        top: usize,
    },
    /// Export history and run the predictor once for every instrument
    Predict,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await?,
        Command::ScanNews { top } => {
            let (scanner, board) = news(&config)?;
            refresh_board(&scanner, &board).await?;
            for article in board.top(top).await {
                println!("{:+.1}\t{}\t{}", article.score, article.title, article.url);
            }
        }
        Command::Predict => {
            let prices = price_service(&config)?;
            prices.hydrate().await;
            let (scanner, board) = news(&config)?;
            if let Err(e) = refresh_board(&scanner, &board).await {
                tracing::warn!(error = %e, "news scan failed, scores default to 0");
            }
            predictor(&config).run_all(&prices, &board).await?;
        }
    }
    Ok(())
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},tower_http=debug")));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn price_service(config: &AppConfig) -> Result<PriceService, PulseError> {
    let client = ProviderClient::builder()
        .base_chart(config.chart_url.clone())
        .timeout(config.request_timeout)
        .build()?;
    let fetcher = Fetcher::new(Arc::new(client), config.instruments.clone())
        .retry_policy(config.retry.clone())
        .pacing(config.pacing);

    Ok(PriceService::builder(fetcher)
        .price_cache(CacheStore::with_disk_dir(config.price_ttl, &config.cache_dir))
        .history_cache(CacheStore::with_disk_dir(config.history_ttl, &config.cache_dir))
        .price_key(config.price_cache_key.clone())
        .journal(FetchJournal::new(config.journal_path()))
        .build())
}

fn news(config: &AppConfig) -> Result<(NewsScanner, NewsBoard), PulseError> {
    let coefficients = Coefficients::load_or_default(&config.coefficients_path());
    let scanner = NewsScanner::new(config.news.feed.clone(), KeywordScorer::french(coefficients))?;
    Ok((scanner, NewsBoard::new()))
}

fn predictor(config: &AppConfig) -> PredictionRunner {
    PredictionRunner::new(&config.predictor, &config.work_dir)
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let prices = price_service(&config)?;
    prices.hydrate().await;

    let (scanner, board) = news(&config)?;
    if let Err(e) = refresh_board(&scanner, &board).await {
        tracing::warn!(error = %e, "initial news scan failed");
    }

    let mut scheduler = Scheduler::new();
    let schedule = DailySchedule::new(config.news.hour, 0, config.news.timezone)?;
    let job_scanner = Arc::new(scanner);
    let job_board = board.clone();
    scheduler.add_daily("news-scan", schedule, move || {
        let scanner = Arc::clone(&job_scanner);
        let board = job_board.clone();
        async move { refresh_board(&scanner, &board).await.map(|_| ()) }
    });

    let runner = predictor(&config);
    {
        let (runner, prices, board) = (runner.clone(), prices.clone(), board.clone());
        let token = scheduler.token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                res = runner.run_all(&prices, &board) => {
                    if let Err(e) = res {
                        tracing::warn!(error = %e, "startup predictions failed");
                    }
                }
            }
        });
    }

    let state = AppState::new(prices, board, runner).with_request_timeout(config.request_timeout);
    let app = stockpulse::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "listening");

    let shutdown = scheduler.token();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("server stopped, cancelling jobs");
    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("received ctrl-c, shutting down"),
        _ = terminate => tracing::warn!("received SIGTERM, shutting down"),
    }
    token.cancel();
}
