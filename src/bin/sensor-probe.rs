//! One-shot queries against a bed sensor.
//!
//! Usage:
//!   sensor-probe poll
//!   sensor-probe probe
//!   sensor-probe frames <FRAME_ID>
//!
//! Reads the same `.env` / environment configuration as the monitor.

use bed_monitor::config::{self, Config};
use bed_monitor::sensor::{HttpSensorGateway, SensorGateway, frame_window};
use clap::{Parser, Subcommand};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(name = "sensor-probe", about = "Query a bed sensor once and print the result")]
struct Args {
    /// Override SENSOR_URL
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Probe,
}

#[derive(Subcommand, Debug)]
enum Probe {
    /// Print the current monitor snapshot
    Poll,
    /// Check that the sensor answers (clears its stored frames)
    Probe,
    /// Print stored frames in the window ending at FRAME_ID
    Frames { frame_id: u64 },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(url) = args.url {
        config.sensor.url = url;
    }
    let gateway = HttpSensorGateway::new(&config.sensor);
    info!("Sensor at {}", gateway.base_url());

    match args.command {
        Probe::Poll => match gateway.poll().await {
            Ok(snapshot) => {
                info!("  present: {}", snapshot.presence);
                info!("  rotation countdown: {} s", snapshot.rotation_countdown_seconds);
                info!("  storage used: {:.1}%", snapshot.storage_used_percent);
            }
            Err(e) => {
                error!("Poll failed: {}", e);
                std::process::exit(1);
            }
        },
        Probe::Probe => {
            if gateway.probe_connectivity().await {
                info!("Sensor answered");
            } else {
                error!("Sensor did not answer");
                std::process::exit(1);
            }
        }
        Probe::Frames { frame_id } => {
            let (after, before) = frame_window(frame_id);
            match gateway.frames_within_window(frame_id).await {
                Ok(frames) => {
                    info!("{} frame(s) in ({}, {}]", frames.len(), after, before);
                    for frame in frames {
                        match serde_json::to_string(&frame) {
                            Ok(line) => println!("{}", line),
                            Err(e) => error!("Unprintable frame: {}", e),
                        }
                    }
                }
                Err(e) => {
                    error!("Frame query failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
