use anyhow::{Context, bail};
use berthing::Config;
use berthing::berthing::summarize;
use berthing::reducer::CenterBeamReducer;
use berthing::session::{CommandClient, DataReceiver, DeviceSession};
use berthing::telemetry::{SensorTelemetry, berth_readings};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str).unwrap_or("demo");
    let config = match args.get(2) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    init_logging(&config.log_filter);

    match mode {
        "simulate" => simulate(&config).await?,
        "monitor" => monitor(&config).await?,
        "demo" => demo(&config).await?,
        other => bail!("unknown mode {other:?}, expected simulate, monitor or demo"),
    }

    Ok(())
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn create_session(config: &Config) -> DeviceSession {
    DeviceSession::new(&config.sensor_id, config.scene.clone(), config.estimator.clone())
}

/// Run a simulated device that waits for start/stop commands.
async fn simulate(config: &Config) -> anyhow::Result<()> {
    let session = create_session(config);
    session
        .connect(config.session.clone())
        .await
        .context("failed to connect simulated device")?;
    info!(command = ?session.command_addr().await, "simulated device ready, Ctrl-C to exit");

    tokio::signal::ctrl_c().await?;
    session.disconnect().await;
    Ok(())
}

/// Drive a device over the wire and report what it sees.
async fn monitor(config: &Config) -> anyhow::Result<()> {
    let telemetry = SensorTelemetry::new(&config.sensor_id, config.estimator.clone());
    let receiver = DataReceiver::bind(
        config.session.data_target(),
        telemetry.clone(),
        Arc::new(CenterBeamReducer::default()),
        config.session.poll_interval(),
    )
    .await
    .context("failed to bind data receiver")?;

    let client = CommandClient::bind(
        SocketAddr::new(config.session.remote_address, 0),
        config.session.command_bind(),
    )
    .await
    .context("failed to bind command client")?;
    client.start().await.context("failed to send start")?;

    let mut sensors = HashMap::new();
    sensors.insert(config.sensor_id.clone(), telemetry);
    report_until_interrupted(config, &sensors).await?;

    if let Err(e) = client.stop().await {
        warn!(error = %e, "failed to send stop");
    }
    info!(stats = ?receiver.stats(), "monitor finished");
    receiver.shutdown(config.session.stop_timeout()).await;
    Ok(())
}

/// Simulated device and monitor in one process over loopback.
async fn demo(config: &Config) -> anyhow::Result<()> {
    let session = create_session(config);
    session
        .connect(config.session.clone())
        .await
        .context("failed to connect simulated device")?;
    let Some(telemetry) = session.telemetry().await else {
        bail!("session lost its connection during startup");
    };

    let receiver = DataReceiver::bind(
        config.session.data_target(),
        telemetry.clone(),
        Arc::new(CenterBeamReducer::default()),
        config.session.poll_interval(),
    )
    .await
    .context("failed to bind data receiver")?;

    session.start_streaming().await?;

    let mut sensors = HashMap::new();
    sensors.insert(config.sensor_id.clone(), telemetry);
    report_until_interrupted(config, &sensors).await?;

    receiver.shutdown(config.session.stop_timeout()).await;
    session.stop_streaming().await;
    session.disconnect().await;
    Ok(())
}

async fn report_until_interrupted(
    config: &Config,
    sensors: &HashMap<String, SensorTelemetry>,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(config.report_interval());
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        for telemetry in sensors.values() {
            if let Some(view) = telemetry.view() {
                info!(sensor = %view.sensor_id, view = %serde_json::to_string(&view)?, "sensor");
            }
        }
        let summary = summarize(&config.berth, &berth_readings(&config.berth, sensors));
        info!(summary = %serde_json::to_string(&summary)?, "berth");
    }
}
