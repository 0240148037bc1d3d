//! # ROV Link
//!
//! Runs one node of the ROV command link: vehicle, operator or landing
//! actuator, selected by the `[node] role` of the configuration file.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use rov_link::config::{Config, LoggingConfig, RelayConfig, Role};
use rov_link::error::RovLinkError;
use rov_link::io::sysfs::{SysfsGpio, SysfsPwm, DEFAULT_GPIO_ROOT};
use rov_link::link::serial::SerialLoRa;
use rov_link::link::{LinkHealthMonitor, LinkState, LongRangeRadio, StdDelay};
use rov_link::motor::MotorActuator;
use rov_link::node::{run_blocking, ActuatorNode, OperatorNode, RelayPort, VehicleNode};
use rov_link::relay::{event_channel, RelayHandshake, UdpPeerLink};
use rov_link::safety::FailsafeSupervisor;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/vehicle.toml";

/// File name prefix of daily log files
const LOG_FILE_PREFIX: &str = "rov-link.log";

/// Number of cycles between status log messages
const STATUS_LOG_CYCLES: u64 = 1000;

/// Pause between radio startup attempts
const INIT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Main entry point for ROV Link
///
/// # Control Flow
///
/// 1. Load configuration (path from the first argument, default `config/vehicle.toml`)
/// 2. Set up logging to the console and optionally to daily files
/// 3. Bring up the node's radio, PWM, GPIO and relay link
/// 4. Run the node's cycle every `loop_period_ms` until Ctrl+C
/// 5. Stop the motors and end the radio session on shutdown
///
/// # Errors
///
/// Returns error if:
/// - The configuration cannot be loaded
/// - The long-range radio fails every startup attempt
/// - The relay link socket cannot be bound
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging)?;

    info!(
        "ROV Link v{} starting as {:?} node...",
        env!("CARGO_PKG_VERSION"),
        config.node.role
    );

    match config.node.role {
        Role::Vehicle => run_vehicle(&config).await,
        Role::Operator => run_operator(&config).await,
        Role::Actuator => run_actuator(&config).await,
    }
}

/// Install the tracing subscriber; keep the returned guard alive to flush file logs
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let (file_layer, guard) = match &logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Open the UART radio and start it, retrying up to `init_attempts` times
fn start_radio(config: &Config) -> rov_link::error::Result<SerialLoRa<SysfsGpio>> {
    let radio_config = &config.radio;
    let reset = radio_config
        .reset_gpio
        .map(|pin| (SysfsGpio::new(DEFAULT_GPIO_ROOT, false), pin));
    let mut radio = SerialLoRa::new(&radio_config.port, radio_config.baud_rate, reset);

    for attempt in 1..=radio_config.init_attempts {
        match radio.begin(radio_config.frequency_hz) {
            Ok(()) => return Ok(radio),
            Err(e) => {
                warn!(
                    "Radio startup attempt {}/{} failed: {}",
                    attempt, radio_config.init_attempts, e
                );
                std::thread::sleep(INIT_RETRY_DELAY);
            }
        }
    }

    error!("Long-range radio on {} did not start", radio_config.port);
    Err(RovLinkError::TransportInit(format!(
        "{} failed {} startup attempt(s)",
        radio_config.port, radio_config.init_attempts
    )))
}

/// Bind the relay link, start its receive task and register the landing peer
async fn start_relay(relay: &RelayConfig) -> Result<RelayPort<SysfsGpio, UdpPeerLink>> {
    let link = UdpPeerLink::bind(relay.bind, relay.local_mac, relay.peers.clone()).await?;

    let (events, inbox) = event_channel(relay.queue_depth);
    link.spawn_receiver(events);

    let status = relay
        .status_gpio
        .map(|pin| (SysfsGpio::new(DEFAULT_GPIO_ROOT, false), pin));
    let handshake = RelayHandshake::new(relay.peer_mac, relay.ack_code, status);

    Ok(RelayPort::new(handshake, link, inbox)?)
}

async fn run_vehicle(config: &Config) -> Result<()> {
    let radio = run_blocking(|| start_radio(config))?;
    info!(
        "Long-range radio started on {} at {} Hz, robot id {}",
        radio.port_path(),
        config.radio.frequency_hz,
        config.radio.robot_id
    );

    let relay = match &config.relay {
        Some(relay) => Some(start_relay(relay).await?),
        None => None,
    };

    let pwm = SysfsPwm::chip(config.motor.pwm_chip, config.motor.period_ns, config.motor.max_duty);
    let mut motors = MotorActuator::new(
        pwm,
        config.motor.motor_channels(),
        config.motor.speed_selector(),
    );
    motors.stop()?;

    let now = Instant::now();
    let mut node = VehicleNode::new(
        config.radio.robot_id,
        radio,
        StdDelay,
        LinkHealthMonitor::new(config.health_settings(), now),
        FailsafeSupervisor::new(config.failsafe_settings(), now),
        motors,
        relay,
    );

    let mut ticker = interval(config.loop_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Vehicle control loop running every {} ms", config.node.loop_period_ms);
    info!("Press Ctrl+C to exit");

    let mut cycles: u64 = 0;
    let mut accepted: u64 = 0;
    let mut dropped: u64 = 0;
    let mut link_state = LinkState::Ok;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = run_blocking(|| node.cycle(Instant::now()));
                cycles += 1;
                accepted += report.accepted as u64;
                dropped += report.dropped as u64;

                if report.link_state != link_state {
                    info!("Link state {} -> {}", link_state, report.link_state);
                    link_state = report.link_state;
                }

                if cycles % STATUS_LOG_CYCLES == 0 {
                    info!(
                        "Frames accepted {} dropped {}, link {}, failsafe {}, radio restarts {}",
                        accepted,
                        dropped,
                        link_state,
                        if report.failsafe_active { "ACTIVE" } else { "off" },
                        node.health().restart_count()
                    );
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                node.shutdown();
                info!("Total frames accepted: {}", accepted);
                break;
            }
        }
    }

    Ok(())
}

async fn run_operator(config: &Config) -> Result<()> {
    let operator = config
        .operator
        .as_ref()
        .context("operator role requires an [operator] section")?;

    let radio = run_blocking(|| start_radio(config))?;
    info!("Long-range radio started on {}", radio.port_path());

    let relay = match &config.relay {
        Some(relay) => Some(start_relay(relay).await?),
        None => None,
    };

    let inputs = SysfsGpio::new(DEFAULT_GPIO_ROOT, operator.active_low);
    let mut node = OperatorNode::new(config.radio.robot_id, radio, inputs, operator.buttons(), relay);

    let mut ticker = interval(config.loop_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Operator transmitting every {} ms", config.node.loop_period_ms);
    info!("Press Ctrl+C to exit");

    let mut sent: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_blocking(|| node.cycle()) {
                    debug!("Failed to send frame: {}", e);
                    continue;
                }

                sent += 1;
                if sent % STATUS_LOG_CYCLES == 0 {
                    info!("Sent {} frames, landing {}", sent, node.landing_state());
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                node.shutdown();
                info!("Total frames sent: {}", sent);
                break;
            }
        }
    }

    Ok(())
}

async fn run_actuator(config: &Config) -> Result<()> {
    let relay = config
        .relay
        .as_ref()
        .context("actuator role requires a [relay] section")?;

    let link = UdpPeerLink::bind(relay.bind, relay.local_mac, relay.peers.clone()).await?;
    let (events, inbox) = event_channel(relay.queue_depth);
    link.spawn_receiver(events);

    let servo = config.actuator.servo_settings();
    let pwm = SysfsPwm::chip(
        config.actuator.pwm_chip,
        u64::from(servo.period_us) * 1000,
        servo.period_us,
    );

    let mut node = ActuatorNode::new(pwm, servo, link, inbox, relay.ack_code);
    node.init()?;

    let mut ticker = interval(config.loop_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => node.cycle(),

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}
