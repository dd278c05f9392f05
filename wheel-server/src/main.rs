mod analog;
mod clock;
mod config;
mod feed;
mod http;
mod pump;
mod sync;

use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wheel_core::config::{POTENTIOMETER, SENSOR_LINES};

use config::{Cli, FeedKind, Settings};
use feed::{Feed, FeedEnd};
use http::AppState;
use sync::HostTelemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;
    let settings = Settings::resolve(&cli).context("failed to load configuration")?;
    serve(settings).await
}

fn init_tracing(directive: Option<&str>) -> anyhow::Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let telemetry = Arc::new(HostTelemetry::new());
    let analog = Arc::new(settings.analog.build());
    let app = AppState::new(Arc::clone(&telemetry), analog, settings.wheel);

    for line in &SENSOR_LINES {
        info!(
            sensor = %line.role,
            name = line.name,
            gpio = line.host_gpio,
            "sensor line"
        );
    }
    info!(
        name = POTENTIOMETER.name,
        ads1115_channel = POTENTIOMETER.ads1115_channel,
        "analog line"
    );

    let (pulses, receiver) = pump::pulse_channel();
    let pump = tokio::spawn(pump::run_pump(receiver, telemetry, settings.wheel));

    let (exit_tx, exit_rx) = oneshot::channel::<()>();
    match settings.feed {
        FeedKind::Stdin => {
            let feed = Feed::new(pulses, app.clone());
            tokio::spawn(async move {
                let stdin = BufReader::new(tokio::io::stdin());
                match feed.run(stdin, tokio::io::stdout()).await {
                    Ok(FeedEnd::Exit) => {
                        let _ = exit_tx.send(());
                    }
                    Ok(FeedEnd::Eof) => info!("stdin closed; pulse feed stopped"),
                    Err(err) => warn!(%err, "pulse feed failed"),
                }
            });
        }
        FeedKind::None => drop(pulses),
    }

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind))?;
    info!(addr = %settings.bind, analog = ?settings.analog, "serving wheel telemetry");

    axum::serve(listener, http::router(app))
        .with_graceful_shutdown(shutdown_signal(exit_rx))
        .await
        .context("http server failed")?;

    pump.abort();
    info!("shut down");
    Ok(())
}

async fn shutdown_signal(exit: oneshot::Receiver<()>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(%err, "failed to listen for ctrl-c");
            }
        }
        Ok(()) = exit => {}
    }
}
