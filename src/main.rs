//! Process entrypoint: load settings, open the store, start the sync
//! scheduler, and serve the HTTP API until interrupted.

use std::sync::Arc;

use tokio::sync::watch;

use slack_pulse::config::Settings;
use slack_pulse::db::PulseDb;
use slack_pulse::scheduler;
use slack_pulse::server::{self, AppState};
use slack_pulse::service::PulseService;
use slack_pulse::slack::{ChatSource, SlackClient};
use slack_pulse::sync::{SyncEngine, SyncOptions};

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if settings.slack.is_none() {
        log::warn!("SLACK_BOT_TOKEN / CHANNEL_ID not set; Slack sync is disabled");
    }
    if settings.api_key.is_none() {
        log::warn!("API_KEY is not set; API endpoints will reject requests");
    }

    // Open read-write once so the schema exists before any read-only open.
    if let Err(e) = PulseDb::open_at(settings.database_path.clone()) {
        log::error!(
            "Failed to open database at {}: {e}",
            settings.database_path.display()
        );
        std::process::exit(1);
    }

    let source = settings.slack.as_ref().map(|slack| {
        (
            Arc::new(SlackClient::new(&slack.bot_token)) as Arc<dyn ChatSource>,
            slack.channel_id.clone(),
        )
    });
    let engine = Arc::new(SyncEngine::new(
        settings.database_path.clone(),
        source,
        SyncOptions {
            roster_path: Some(settings.roster_path.clone()),
            oldest_ts_override: settings.oldest_ts_override,
            latest_ts_override: settings.latest_ts_override,
        },
    ));
    let service = Arc::new(PulseService::new(settings.database_path.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(scheduler::run_sync_scheduler(
        engine.clone(),
        settings.sync_interval,
        shutdown_rx,
    ));

    let app = server::build_app(AppState {
        service,
        engine,
        api_key: settings.api_key.clone(),
    });

    let listener = match tokio::net::TcpListener::bind(settings.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {e}", settings.bind_addr);
            std::process::exit(1);
        }
    };
    log::info!("Listening on {}", settings.bind_addr);

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
    if let Err(e) = serve.await {
        log::error!("Server error: {e}");
        std::process::exit(1);
    }
}
