mod bot;
mod classifier;
mod completion;
mod config;
mod rtm;

use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::prelude::*;

use bot::{Engine, Store};
use completion::CompletionClient;
use config::Config;
use rtm::{RtmApi, RtmLoop};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bearybot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("bearybot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting bearybot...");
    info!("Loaded config from {config_path}");

    let api = RtmApi::new(&config.api_base, &config.rtm_token);

    let session = match api.start().await {
        Ok(session) => session,
        Err(e) => {
            error!("RTM session start failed: {e}");
            std::process::exit(1);
        }
    };

    let operator_channel = match api.p2p_create(&config.operator_uid).await {
        Ok(vchannel_id) => vchannel_id,
        Err(e) => {
            error!("Failed to open operator channel: {e}");
            std::process::exit(1);
        }
    };
    info!("Operator channel: {} ({})", operator_channel, config.operator_uid);

    let (rtm_loop, msg_rx, err_rx) = match RtmLoop::connect(&session.ws_host).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("Websocket connect failed: {e}");
            std::process::exit(1);
        }
    };
    rtm_loop.start_keepalive(Duration::from_secs(config.keepalive_secs));

    let store = Store::load_or_new(&config.store_path);
    let completion = CompletionClient::new(
        config.completion_api_base.clone(),
        config.completion_api_key.clone(),
    );

    let engine = Engine::new(
        session.me,
        config.operator_uid,
        operator_channel,
        config.forward_trigger,
        store,
        api,
        rtm_loop,
        completion,
    );

    if let Err(e) = engine.run(msg_rx, err_rx).await {
        error!("Fatal transport error: {e}");
        std::process::exit(1);
    }
}
