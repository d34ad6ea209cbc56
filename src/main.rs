use bed_monitor::backend::BackendClient;
use bed_monitor::config::{self, Config};
use bed_monitor::control::CommandListener;
use bed_monitor::hardware::{LogStatusDisplay, NoopRelay, RelayControl, SysfsRelay};
use bed_monitor::instance_lock::{InstanceLock, InstanceLockError};
use bed_monitor::network::WpaSupplicantWifi;
use bed_monitor::orchestrator::{Orchestrator, Ports};
use bed_monitor::sensor::HttpSensorGateway;
use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};

#[derive(Parser, Debug)]
#[command(name = "bed-monitor", about = "Bed occupancy monitor for pressure-mapping sensors")]
struct Args {
    /// Log filter, e.g. `info` or `bed_monitor=debug`
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Do not touch the relay GPIO (bench setups without a relay board)
    #[arg(long)]
    no_relay: bool,

    /// Start monitoring immediately instead of waiting for a `start` command
    #[arg(long)]
    autostart: bool,
}

fn init_logger(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Must run before the runtime spawns worker threads.
    config::load_dotenv();

    let args = Args::parse();
    init_logger(&args.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(args));
}

async fn run(args: Args) {
    info!("Starting bed monitor");

    let _lock = match InstanceLock::acquire() {
        Ok(lock) => lock,
        Err(InstanceLockError::AlreadyRunning) => {
            error!("Another bed-monitor instance is already running");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Sensor: {} ({})", config.sensor.sensor_id, config.sensor.url);
    info!("  Event endpoint: {}", config.backend.event_endpoint);
    info!("  Relay pin: {}", config.relay.pin);
    info!("  Command socket: {}", config.network.command_socket);

    let relay: Arc<dyn RelayControl> = if args.no_relay {
        warn!("[Relay] Disabled; sensor power-cycling will be skipped");
        Arc::new(NoopRelay)
    } else {
        Arc::new(SysfsRelay::new(&config.relay.gpio_root))
    };
    let backend = Arc::new(BackendClient::new(config.backend.clone()));
    let ports = Ports {
        gateway: Arc::new(HttpSensorGateway::new(&config.sensor)),
        relay,
        display: Arc::new(LogStatusDisplay::new()),
        sink: backend.clone(),
        registry: backend,
        wifi: Arc::new(WpaSupplicantWifi::new(&config.network)),
    };

    let listener = match CommandListener::bind(&config.network.command_socket) {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Failed to bind command socket {}: {}",
                config.network.command_socket, e
            );
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(Orchestrator::new(config, ports));
    orchestrator.start_heartbeat();
    orchestrator.start_link_watch();
    if args.autostart {
        orchestrator.start_monitoring().await;
    }

    let listener_task = tokio::spawn(listener.run(
        orchestrator.clone(),
        orchestrator.shutdown_token(),
    ));

    info!("Bed monitor running. Press Ctrl+C to stop.");
    wait_for_shutdown().await;

    orchestrator.shutdown().await;
    let _ = listener_task.await;
    info!("Bed monitor stopped");
}

async fn wait_for_shutdown() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        }
        _ = terminate.recv() => {}
    }
    info!("Received shutdown signal");
}
