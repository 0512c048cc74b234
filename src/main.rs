use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use touchkey::{
    app,
    ble::BlePeripheral,
    config::Cli,
    gpio::LogIndicator,
    hid::HidKeyboard,
    radio::RadioEvent,
    sensor::{ReplaySensor, StdinSensor, TouchSensor},
    touch::TouchSampler,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let touch_cfg = cli.touch_config();

    let (evt_tx, mut evt_rx) = mpsc::channel::<RadioEvent>(64);
    let radio = BlePeripheral::new(evt_tx).await.context("opening BLE adapter")?;
    let mut keyboard = HidKeyboard::new(radio, cli.keyboard_config())
        .await
        .context("starting HID keyboard service")?;

    let sensor: Box<dyn TouchSensor> = match &cli.replay {
        Some(path) => Box::new(
            ReplaySensor::from_file(path)
                .await
                .with_context(|| format!("loading readings from {}", path.display()))?,
        ),
        None => Box::new(StdinSensor::spawn(touch_cfg.touch_pin)),
    };
    let mut sampler = TouchSampler::new(sensor, LogIndicator::default(), touch_cfg);

    tracing::info!(
        threshold = sampler.config().threshold,
        debounce_ms = sampler.config().debounce.as_millis() as u64,
        "Sampling started. Remove old pairings of this device on the host first."
    );

    tokio::select! {
        res = app::run(&mut keyboard, &mut sampler, &mut evt_rx) => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, exiting"),
    }
    Ok(())
}
