//! Occupancy Sensor Agent CLI
//!
//! Samples one motion or IR sensor and delivers per-window event counts to a
//! remote store.

use chrono::Utc;
use clap::Parser;
use occupancy_sensor_agent::{
    config::{AgentConfig, ConfigError},
    core::{Aggregator, DeliveryScheduler, Sampler},
    delivery::{BlockingStoreClient, StoreConfig},
    logfile::open_shared_log,
    sensor::{Sensor, SensorKind},
    VERSION,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Exit code for configuration and sensor initialisation failures.
const EXIT_CONFIG: i32 = 2;

/// How long the shutdown path waits for an in-flight delivery to report.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "occupancy-sensor")]
#[command(version = VERSION)]
#[command(about = "Occupancy telemetry agent for a single motion/IR sensor", long_about = None)]
struct Cli {
    /// Sensor variant wired to the pin (motion or ir)
    #[arg(short, long, default_value = "motion")]
    sensor: String,

    /// BCM pin number the sensor is wired to
    #[arg(short, long, default_value_t = 17)]
    pin: u8,

    /// Poll interval in seconds
    #[arg(short = 'i', long, default_value_t = 1)]
    poll_interval: u64,

    /// Window size in seconds
    #[arg(short, long, default_value_t = 60)]
    window_size: u64,

    /// Flush interval in seconds (must be a multiple of the window size)
    #[arg(short, long, default_value_t = 600)]
    flush_interval: u64,

    /// Base URL of the remote store
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    store_url: String,

    /// Bearer token for the remote store
    #[arg(long)]
    store_token: Option<String>,

    /// Directory for the append-only event log
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    println!("Occupancy Sensor Agent v{VERSION}");
    println!();

    let sensor_kind: SensorKind = match cli.sensor.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("Error: {}", ConfigError::InvalidSensor(e));
            std::process::exit(EXIT_CONFIG);
        }
    };

    let defaults = AgentConfig::default();
    let config = AgentConfig {
        sensor: sensor_kind,
        pin: cli.pin,
        poll_interval: Duration::from_secs(cli.poll_interval),
        window_size: Duration::from_secs(cli.window_size),
        flush_interval: Duration::from_secs(cli.flush_interval),
        store_url: cli.store_url,
        store_token: cli.store_token,
        log_dir: cli.log_dir.unwrap_or(defaults.log_dir),
    };
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(EXIT_CONFIG);
    }

    let log = open_shared_log(&config.log_dir);

    println!("Starting agent...");
    println!("  Sensor: {} on pin {}", config.sensor, config.pin);
    println!("  Poll interval: {}s", config.poll_interval.as_secs());
    println!("  Window size: {}s", config.window_size.as_secs());
    println!("  Flush interval: {}s", config.flush_interval.as_secs());
    println!("  Store: {}", config.store_url);
    if let Some(path) = log.path() {
        println!("  Event log: {path:?}");
    }

    if cfg!(not(all(target_os = "linux", feature = "gpio"))) {
        eprintln!("Warning: built without the gpio feature; using an idle simulated sensor.");
    }

    // Sensor bring-up, including its warm-up pause. Fatal on failure: the
    // agent must not run a loop that silently reports zero events.
    let init_msg = format!(
        "Initialising {} sensor on pin {}.",
        config.sensor, config.pin
    );
    println!("{init_msg}");
    log.append(&init_msg);

    let sensor = match Sensor::init(config.sensor, config.pin) {
        Ok(sensor) => sensor,
        Err(e) => {
            let msg = format!(
                "Error initialising {} sensor on pin {}: {e}",
                config.sensor, config.pin
            );
            eprintln!("{msg}");
            log.append(&msg);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let ready_msg = format!(
        "Initialised {} sensor on pin {}.",
        config.sensor, config.pin
    );
    println!("{ready_msg}");
    log.append(&ready_msg);

    // Remote store client, driven from the delivery worker thread.
    let store_config = StoreConfig::new(config.store_url.clone(), config.store_token.clone());
    let store = match BlockingStoreClient::new(store_config, config.sensor) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    };
    println!("  Device ID: {}", store.device_id());
    match store.test_connection() {
        Ok(true) => println!("  Store connection: OK"),
        Ok(false) => eprintln!("Warning: Store health check failed"),
        Err(e) => eprintln!("Warning: Could not connect to store: {e}"),
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let now = Utc::now();
    let mut sampler = Sampler::new(sensor);
    let mut aggregator = Aggregator::new(config.window_size, now);
    let mut scheduler =
        DeliveryScheduler::spawn(store, config.flush_interval, now, log.clone());

    // Main control loop: sample, aggregate, check flush eligibility, sleep.
    while running.load(Ordering::SeqCst) {
        let now = Utc::now();
        let observation = sampler.sample();
        let closed = aggregator.observe(observation.is_event(), now);

        if closed > 0 {
            let backlog = aggregator.backlog();
            for window in &backlog[backlog.len() - closed..] {
                let msg = format!(
                    "Closed window starting {} with {} event(s).",
                    window.start.format("%H:%M:%S"),
                    window.count
                );
                println!("[{}] {msg}", now.format("%H:%M:%S"));
                log.append(&msg);
            }
        }

        scheduler.tick(now, &mut aggregator);
        thread::sleep(config.poll_interval);
    }

    // Shutdown: close the open window early, try one last flush, and let an
    // in-flight attempt finish. Closed windows are never discarded silently.
    println!();
    println!("Stopping agent...");
    aggregator.close_open();
    scheduler.shutdown(&mut aggregator, SHUTDOWN_FLUSH_TIMEOUT);

    let undelivered = aggregator.pending_events();
    if undelivered > 0 {
        let msg = format!("Shutting down with {undelivered} undelivered event(s).");
        println!("{msg}");
        log.append(&msg);
    } else {
        log.append("Shutting down with an empty backlog.");
    }
}
