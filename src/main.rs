use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use stickcast::audio::CaptureSource;
use stickcast::button::ButtonSource;
use stickcast::config::{self, AudioConfig, ClientConfig};
use stickcast::hardware::{Ads1115, GpioButton};
use stickcast::session::{Devices, ReconnectLoop};
use stickcast::transport::WsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "stickcast", version, about = "Joystick and push-to-talk client")]
struct Args {
    /// Config file, defaults to ~/.config/stickcast/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// WebSocket URL, overrides [server].url
    #[arg(short, long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup()?;

    let config = load_config(&args).await?;

    let mut adc = Ads1115::from_config(&config.joystick);
    if let Err(e) = adc.open() {
        // Calibration retries on every session, so a late bus is tolerated
        warn!("Joystick ADC not ready yet: {}", e);
    }
    let button: Box<dyn ButtonSource> =
        match GpioButton::open(config.button.pin, config.button.active_low) {
            Ok(button) => Box::new(button),
            Err(e) => {
                // Joystick control stays usable without the button
                error!("Push-to-talk disabled, button unavailable: {}", e);
                Box::new(AtomicBool::new(false))
            }
        };
    let devices = Devices::new(adc, button, capture_source(&config.audio));

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let connector = WsConnector::new(config.server.url.clone(), config.server.end_marker.clone());
    let mut reconnect = ReconnectLoop::new(connector, devices, config);
    reconnect.run(&shutdown).await;

    info!("Shut down cleanly");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

async fn load_config(args: &Args) -> Result<ClientConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    config::ensure_default_config(&path).await?;

    let mut config = ClientConfig::load(&path).await?;
    if let Some(url) = &args.server {
        info!("Server URL overridden from the command line: {}", url);
        config.server.url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

#[cfg(feature = "cpal")]
fn capture_source(audio: &AudioConfig) -> Arc<dyn CaptureSource> {
    Arc::new(stickcast::audio::CpalCaptureSource::new(audio.device.clone()))
}

#[cfg(not(feature = "cpal"))]
fn capture_source(audio: &AudioConfig) -> Arc<dyn CaptureSource> {
    warn!(
        "Built without audio support, push-to-talk will only send end markers ({})",
        audio.capture_format()
    );
    Arc::new(stickcast::audio::DisabledCapture)
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
