//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, RovLinkError};
use crate::link::{HealthSettings, RestartTimings};
use crate::motor::{MotorChannels, SpeedSelector, SPEED_LEVEL_COUNT};
use crate::node::{OperatorButtons, ServoSettings};
use crate::relay::PeerAddress;
use crate::safety::FailsafeSettings;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub node: NodeConfig,

    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub failsafe: FailsafeConfig,

    #[serde(default)]
    pub motor: MotorConfig,

    #[serde(default)]
    pub relay: Option<RelayConfig>,

    #[serde(default)]
    pub operator: Option<OperatorConfig>,

    #[serde(default)]
    pub actuator: ActuatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which node this process runs as
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Vehicle,
    Operator,
    Actuator,
}

/// Node configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub role: Role,

    #[serde(default = "default_loop_period_ms")]
    pub loop_period_ms: u64,
}

/// Long-range radio configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_radio_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: u64,

    #[serde(default = "default_robot_id")]
    pub robot_id: u8,

    /// GPIO wired to the module's reset input
    #[serde(default)]
    pub reset_gpio: Option<u32>,

    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,
}

/// Link health configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    #[serde(default = "default_reconnect_timeout_ms")]
    pub reconnect_timeout_ms: u64,
}

/// Failsafe configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FailsafeConfig {
    #[serde(default = "default_failsafe_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_failsafe_rearm_ms")]
    pub rearm_ms: u64,
}

/// Drive motor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MotorConfig {
    #[serde(default)]
    pub pwm_chip: u32,

    /// Left forward, left reverse, right forward, right reverse
    #[serde(default = "default_motor_channels")]
    pub channels: [u32; 4],

    #[serde(default = "default_motor_period_ns")]
    pub period_ns: u64,

    #[serde(default = "default_max_duty")]
    pub max_duty: u16,

    #[serde(default = "default_speed_levels")]
    pub speed_levels: [u16; SPEED_LEVEL_COUNT],

    #[serde(default)]
    pub default_level: usize,
}

/// Short-range relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Landing actuator node (unused by the actuator itself)
    #[serde(default = "default_peer_mac")]
    pub peer_mac: PeerAddress,

    /// This node's own address
    pub local_mac: PeerAddress,

    #[serde(default = "default_ack_code")]
    pub ack_code: u8,

    /// Output mirroring the landing state
    #[serde(default)]
    pub status_gpio: Option<u32>,

    #[serde(default = "default_relay_bind")]
    pub bind: SocketAddr,

    /// Known peer endpoints keyed by hardware address
    #[serde(default)]
    pub peers: HashMap<PeerAddress, SocketAddr>,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Operator control GPIOs
#[derive(Debug, Deserialize, Clone)]
pub struct OperatorConfig {
    pub left_forward: u32,
    pub left_reverse: u32,
    pub right_forward: u32,
    pub right_reverse: u32,
    pub speed: u32,
    pub landing: u32,

    /// Buttons pull the line low when pressed
    #[serde(default = "default_active_low")]
    pub active_low: bool,
}

/// Landing servo configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ActuatorConfig {
    #[serde(default)]
    pub pwm_chip: u32,

    #[serde(default = "default_servo_channels")]
    pub channels: Vec<u32>,

    #[serde(default = "default_servo_period_us")]
    pub period_us: u16,

    #[serde(default = "default_min_pulse_us")]
    pub min_pulse_us: u16,

    #[serde(default = "default_max_pulse_us")]
    pub max_pulse_us: u16,

    #[serde(default = "default_open_angle")]
    pub open_angle: u16,

    #[serde(default = "default_closed_angle")]
    pub closed_angle: u16,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; console only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_loop_period_ms() -> u64 { 10 }

fn default_radio_port() -> String { "/dev/ttyS0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_frequency_hz() -> u64 { 433_000_000 }
fn default_robot_id() -> u8 { 69 }
fn default_init_attempts() -> u32 { 3 }

fn default_health_check_interval_ms() -> u64 { 5000 }
fn default_reconnect_timeout_ms() -> u64 { 10_000 }

fn default_failsafe_timeout_ms() -> u64 { 300 }
fn default_failsafe_rearm_ms() -> u64 { 1000 }

fn default_motor_channels() -> [u32; 4] { [0, 1, 2, 3] }
fn default_motor_period_ns() -> u64 { 1_000_000 }
fn default_max_duty() -> u16 { 255 }
fn default_speed_levels() -> [u16; SPEED_LEVEL_COUNT] { [255, 120, 90] }

fn default_peer_mac() -> PeerAddress { PeerAddress::new([0x1C, 0xDB, 0xD4, 0xD4, 0x0F, 0x80]) }
fn default_ack_code() -> u8 { 200 }
fn default_relay_bind() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 4210)) }
fn default_queue_depth() -> usize { 16 }

fn default_active_low() -> bool { true }

fn default_servo_channels() -> Vec<u32> { vec![0, 1] }
fn default_servo_period_us() -> u16 { 20_000 }
fn default_min_pulse_us() -> u16 { 544 }
fn default_max_pulse_us() -> u16 { 2400 }
fn default_open_angle() -> u16 { 175 }
fn default_closed_angle() -> u16 { 5 }

fn default_log_level() -> String { "info".to_string() }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: default_radio_port(),
            baud_rate: default_baud_rate(),
            frequency_hz: default_frequency_hz(),
            robot_id: default_robot_id(),
            reset_gpio: None,
            init_attempts: default_init_attempts(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            health_check_interval_ms: default_health_check_interval_ms(),
            reconnect_timeout_ms: default_reconnect_timeout_ms(),
        }
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_failsafe_timeout_ms(),
            rearm_ms: default_failsafe_rearm_ms(),
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            pwm_chip: 0,
            channels: default_motor_channels(),
            period_ns: default_motor_period_ns(),
            max_duty: default_max_duty(),
            speed_levels: default_speed_levels(),
            default_level: 0,
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            pwm_chip: 0,
            channels: default_servo_channels(),
            period_us: default_servo_period_us(),
            min_pulse_us: default_min_pulse_us(),
            max_pulse_us: default_max_pulse_us(),
            open_angle: default_open_angle(),
            closed_angle: default_closed_angle(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn invalid(message: impl Display) -> RovLinkError {
    RovLinkError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rov_link::config::Config;
    ///
    /// let config = Config::load("config/vehicle.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range or a
    /// section required by the node role is missing
    fn validate(&self) -> Result<()> {
        if self.node.loop_period_ms == 0 || self.node.loop_period_ms > 1000 {
            return Err(invalid("loop_period_ms must be between 1 and 1000"));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        match self.node.role {
            Role::Vehicle => {
                self.validate_radio()?;
                self.validate_link()?;
                self.validate_failsafe()?;
                self.validate_motor()?;
            }
            Role::Operator => {
                self.validate_radio()?;
                if self.operator.is_none() {
                    return Err(invalid("operator role requires an [operator] section"));
                }
            }
            Role::Actuator => {
                if self.relay.is_none() {
                    return Err(invalid("actuator role requires a [relay] section"));
                }
                self.validate_actuator()?;
            }
        }

        if let Some(relay) = &self.relay {
            validate_relay(relay, self.node.role)?;
        }

        Ok(())
    }

    fn validate_radio(&self) -> Result<()> {
        if self.radio.port.is_empty() {
            return Err(invalid("radio port cannot be empty"));
        }

        if ![1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200].contains(&self.radio.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200",
            ));
        }

        if !(137_000_000..=1_020_000_000).contains(&self.radio.frequency_hz) {
            return Err(invalid("frequency_hz must be between 137 MHz and 1020 MHz"));
        }

        if self.radio.init_attempts == 0 || self.radio.init_attempts > 10 {
            return Err(invalid("init_attempts must be between 1 and 10"));
        }

        Ok(())
    }

    fn validate_link(&self) -> Result<()> {
        let link = &self.link;

        if link.health_check_interval_ms == 0 || link.health_check_interval_ms > 60_000 {
            return Err(invalid("health_check_interval_ms must be between 1 and 60000"));
        }

        if link.reconnect_timeout_ms < link.health_check_interval_ms
            || link.reconnect_timeout_ms > 600_000
        {
            return Err(invalid(
                "reconnect_timeout_ms must be between health_check_interval_ms and 600000",
            ));
        }

        Ok(())
    }

    fn validate_failsafe(&self) -> Result<()> {
        if self.failsafe.timeout_ms == 0 || self.failsafe.timeout_ms > 60_000 {
            return Err(invalid("failsafe timeout_ms must be between 1 and 60000"));
        }

        if self.failsafe.rearm_ms < self.failsafe.timeout_ms {
            return Err(invalid("failsafe rearm_ms must not be less than timeout_ms"));
        }

        if self.node.loop_period_ms >= self.failsafe.timeout_ms {
            return Err(invalid("loop_period_ms must be shorter than the failsafe timeout"));
        }

        Ok(())
    }

    fn validate_motor(&self) -> Result<()> {
        let motor = &self.motor;

        if motor.period_ns == 0 {
            return Err(invalid("motor period_ns must be greater than 0"));
        }

        if motor.max_duty == 0 {
            return Err(invalid("motor max_duty must be greater than 0"));
        }

        for &level in &motor.speed_levels {
            if level > motor.max_duty {
                return Err(invalid(format!(
                    "speed level {} exceeds max_duty {}",
                    level, motor.max_duty
                )));
            }
        }

        if motor.default_level >= SPEED_LEVEL_COUNT {
            return Err(invalid(format!(
                "default_level must be less than {}",
                SPEED_LEVEL_COUNT
            )));
        }

        for (i, channel) in motor.channels.iter().enumerate() {
            if motor.channels[..i].contains(channel) {
                return Err(invalid(format!("motor channel {} is used twice", channel)));
            }
        }

        Ok(())
    }

    fn validate_actuator(&self) -> Result<()> {
        let actuator = &self.actuator;

        if actuator.channels.is_empty() {
            return Err(invalid("actuator channels cannot be empty"));
        }

        if actuator.min_pulse_us >= actuator.max_pulse_us
            || actuator.max_pulse_us > actuator.period_us
        {
            return Err(invalid(
                "servo pulses must satisfy min_pulse_us < max_pulse_us <= period_us",
            ));
        }

        if actuator.open_angle > 180 || actuator.closed_angle > 180 {
            return Err(invalid("servo angles must be between 0 and 180"));
        }

        Ok(())
    }

    /// Link health monitor settings
    pub fn health_settings(&self) -> HealthSettings {
        HealthSettings {
            check_interval: Duration::from_millis(self.link.health_check_interval_ms),
            reconnect_timeout: Duration::from_millis(self.link.reconnect_timeout_ms),
            frequency_hz: self.radio.frequency_hz,
            restart_timings: RestartTimings::default(),
        }
    }

    /// Failsafe supervisor settings
    pub fn failsafe_settings(&self) -> FailsafeSettings {
        FailsafeSettings {
            timeout: Duration::from_millis(self.failsafe.timeout_ms),
            rearm: Duration::from_millis(self.failsafe.rearm_ms),
        }
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_millis(self.node.loop_period_ms)
    }
}

fn validate_relay(relay: &RelayConfig, role: Role) -> Result<()> {
    if relay.ack_code <= 1 {
        return Err(invalid("ack_code must differ from the landing commands 0 and 1"));
    }

    if relay.queue_depth == 0 || relay.queue_depth > 1024 {
        return Err(invalid("queue_depth must be between 1 and 1024"));
    }

    if role != Role::Actuator {
        if relay.peer_mac == relay.local_mac {
            return Err(invalid("relay peer_mac must differ from local_mac"));
        }

        if !relay.peers.contains_key(&relay.peer_mac) {
            return Err(invalid(format!(
                "relay peers has no endpoint for peer_mac {}",
                relay.peer_mac
            )));
        }
    }

    Ok(())
}

impl MotorConfig {
    pub fn motor_channels(&self) -> MotorChannels {
        MotorChannels::from_array(self.channels)
    }

    pub fn speed_selector(&self) -> SpeedSelector {
        SpeedSelector::new(self.speed_levels, self.default_level)
    }
}

impl OperatorConfig {
    pub fn buttons(&self) -> OperatorButtons {
        OperatorButtons {
            left_forward: self.left_forward,
            left_reverse: self.left_reverse,
            right_forward: self.right_forward,
            right_reverse: self.right_reverse,
            speed: self.speed,
            landing: self.landing,
        }
    }
}

impl ActuatorConfig {
    pub fn servo_settings(&self) -> ServoSettings {
        ServoSettings {
            channels: self.channels.clone(),
            period_us: self.period_us,
            min_pulse_us: self.min_pulse_us,
            max_pulse_us: self.max_pulse_us,
            open_angle: self.open_angle,
            closed_angle: self.closed_angle,
        }
    }
}
