use auth::ApiCredentials;
use common::Settings;
use connector_coinbase::{FeedConnection, OrderBookFeed};
use connector_core::{ConnectionEvent, ConnectorConfig, JsonLinesFrameLog};
use metrics::create_metrics;
use orderbook::BookView;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// How often the feed is checked for a fatal routing error.
const FATAL_CHECK_INTERVAL: Duration = Duration::from_secs(1);

const EXIT_ERROR: u8 = 1;
const EXIT_CONFIG: u8 = 2;

const USAGE: &str = "usage: runner [--channel <name>] [--log-frames <path>] [PRODUCT...]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    products: Vec<String>,
    channel: Option<String>,
    log_frames: Option<PathBuf>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--channel" => {
                    let value = args.next().ok_or("--channel needs a value")?;
                    parsed.channel = Some(value);
                }
                "--log-frames" => {
                    let value = args.next().ok_or("--log-frames needs a path")?;
                    parsed.log_frames = Some(PathBuf::from(value));
                }
                flag if flag.starts_with("--") => {
                    return Err(format!("unknown option {}", flag));
                }
                _ => {
                    if !parsed.products.contains(&arg) {
                        parsed.products.push(arg);
                    }
                }
            }
        }

        Ok(parsed)
    }

    fn apply(self, settings: &mut Settings) -> Option<PathBuf> {
        if !self.products.is_empty() {
            settings.products = self.products;
        }
        if let Some(channel) = self.channel {
            settings.channel = channel;
        }
        self.log_frames
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    common::init_logging();

    let feed = match build_feed() {
        Ok(feed) => feed,
        Err(message) => {
            error!(error = %message, "Invalid configuration");
            eprintln!("{}", USAGE);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let mut views = feed.subscribe_views();
    let mut lifecycle = feed.connection().subscribe_lifecycle();

    info!(
        url = %feed.connection().config().url,
        channel = %feed.connection().config().channel,
        products = ?feed.registry().instruments(),
        "Starting order book feed"
    );

    if let Err(e) = feed.start().await {
        error!(error = %e, "Failed to start feed");
        return if e.is_config_error() {
            ExitCode::from(EXIT_CONFIG)
        } else {
            ExitCode::from(EXIT_ERROR)
        };
    }

    let mut last_views: HashMap<String, BookView> = HashMap::new();
    let mut health = tokio::time::interval(HEALTH_LOG_INTERVAL);
    let mut fatal_check = tokio::time::interval(FATAL_CHECK_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, initiating shutdown");
                break;
            }

            view = views.recv() => match view {
                Ok(view) => {
                    let changed = last_views
                        .get(&view.instrument)
                        .map_or(true, |previous| view.top_changed(previous));
                    if changed {
                        println!("{}", view);
                        last_views.insert(view.instrument.clone(), view);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Console fell behind the book feed");
                }
                Err(RecvError::Closed) => break,
            },

            event = lifecycle.recv() => {
                if let Ok(ConnectionEvent::Closed) = event {
                    info!("Feed connection closed");
                    break;
                }
            }

            _ = fatal_check.tick() => {
                if let Some(e) = feed.fatal_error() {
                    error!(error = %e, "Stopping on configuration error");
                    break;
                }
            }

            _ = health.tick() => {
                let snapshot = feed.connection().metrics().snapshot();
                let status = snapshot.health_status();
                info!(
                    status = %status,
                    frames = snapshot.frames_received,
                    frames_per_sec = %format!("{:.1}", snapshot.frames_per_second),
                    batches = snapshot.batches_applied,
                    errors = snapshot.decode_errors + snapshot.transport_errors,
                    reconnects = snapshot.reconnect_attempts,
                    gaps = feed.registry().gaps_detected(),
                    "Health check"
                );
            }
        }
    }

    feed.close().await;

    // Print final metrics
    println!("\n{}", feed.connection().metrics().snapshot());

    let code = match feed.last_error() {
        Some(e) if e.is_config_error() => EXIT_CONFIG,
        Some(e) => {
            warn!(error = %e, "Last recorded error");
            EXIT_ERROR
        }
        None => 0,
    };

    info!(exit_code = code, "Shutdown complete");
    ExitCode::from(code)
}

/// Assemble the feed from the environment and command line.
fn build_feed() -> Result<OrderBookFeed, String> {
    let mut settings = Settings::from_env().map_err(|e| e.to_string())?;
    let args = Args::parse(std::env::args().skip(1))?;
    let log_frames = args.apply(&mut settings);

    let credentials = ApiCredentials::from_env().map_err(|e| e.to_string())?;

    let config = ConnectorConfig::from_settings(&settings);
    config.validate().map_err(|e| e.to_string())?;

    let mut connection =
        FeedConnection::new(config, credentials).with_metrics(create_metrics());

    if let Some(path) = log_frames {
        let log = JsonLinesFrameLog::create(&path)
            .map_err(|e| format!("cannot open frame log {}: {}", path.display(), e))?;
        info!(path = %path.display(), "Recording raw frames");
        connection = connection.with_frame_log(Arc::new(log));
    }

    OrderBookFeed::new(connection).map_err(|e| e.to_string())
}
