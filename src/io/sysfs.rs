//! # Linux sysfs GPIO and PWM
//!
//! Drives pins through `/sys/class/gpio` and `/sys/class/pwm`. Pins and
//! channels are exported and configured lazily on first use.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DigitalInput, DigitalOutput, PwmOutput};
use crate::error::{Result, RovLinkError};

/// Default sysfs GPIO class directory
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Default sysfs PWM class directory
pub const DEFAULT_PWM_ROOT: &str = "/sys/class/pwm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// GPIO access through sysfs value files
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    active_low: bool,
    configured: HashMap<u32, Direction>,
}

impl SysfsGpio {
    /// # Arguments
    ///
    /// * `root` - GPIO class directory (normally [`DEFAULT_GPIO_ROOT`])
    /// * `active_low` - Invert levels, for buttons wired to ground with pull-ups
    pub fn new<P: AsRef<Path>>(root: P, active_low: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            active_low,
            configured: HashMap::new(),
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    fn ensure(&mut self, pin: u32, direction: Direction) -> Result<()> {
        if self.configured.get(&pin) == Some(&direction) {
            return Ok(());
        }

        let pin_dir = self.pin_dir(pin);
        if !pin_dir.exists() {
            write_attr(&self.root.join("export"), &pin.to_string(), RovLinkError::Gpio)?;
        }
        write_attr(&pin_dir.join("direction"), direction.as_str(), RovLinkError::Gpio)?;

        debug!("GPIO {} configured as {}", pin, direction.as_str());
        self.configured.insert(pin, direction);
        Ok(())
    }
}

impl DigitalInput for SysfsGpio {
    fn read(&mut self, pin: u32) -> Result<bool> {
        self.ensure(pin, Direction::In)?;

        let path = self.pin_dir(pin).join("value");
        let raw = fs::read_to_string(&path)
            .map_err(|e| RovLinkError::Gpio(format!("Failed to read {}: {}", path.display(), e)))?;

        Ok((raw.trim() == "1") != self.active_low)
    }
}

impl DigitalOutput for SysfsGpio {
    fn write(&mut self, pin: u32, high: bool) -> Result<()> {
        self.ensure(pin, Direction::Out)?;

        let level = if high != self.active_low { "1" } else { "0" };
        write_attr(&self.pin_dir(pin).join("value"), level, RovLinkError::Gpio)
    }
}

/// PWM channels of one sysfs pwmchip sharing a period
#[derive(Debug)]
pub struct SysfsPwm {
    chip: PathBuf,
    period_ns: u64,
    max_duty: u16,
    enabled: HashSet<u32>,
}

impl SysfsPwm {
    /// # Arguments
    ///
    /// * `chip` - pwmchip directory, e.g. `/sys/class/pwm/pwmchip0`
    /// * `period_ns` - PWM period written to every channel
    /// * `max_duty` - Duty value that maps to 100%
    pub fn new<P: AsRef<Path>>(chip: P, period_ns: u64, max_duty: u16) -> Self {
        Self {
            chip: chip.as_ref().to_path_buf(),
            period_ns,
            max_duty,
            enabled: HashSet::new(),
        }
    }

    /// Open `pwmchip{index}` under the default PWM root
    pub fn chip(index: u32, period_ns: u64, max_duty: u16) -> Self {
        Self::new(
            Path::new(DEFAULT_PWM_ROOT).join(format!("pwmchip{}", index)),
            period_ns,
            max_duty,
        )
    }

    fn channel_dir(&self, channel: u32) -> PathBuf {
        self.chip.join(format!("pwm{}", channel))
    }

    /// Duty value converted to nanoseconds of high time
    fn duty_ns(&self, duty: u16) -> u64 {
        let duty = duty.min(self.max_duty) as u64;
        self.period_ns * duty / self.max_duty as u64
    }

    fn ensure(&mut self, channel: u32) -> Result<()> {
        if self.enabled.contains(&channel) {
            return Ok(());
        }

        let dir = self.channel_dir(channel);
        if !dir.exists() {
            write_attr(&self.chip.join("export"), &channel.to_string(), RovLinkError::Pwm)?;
        }
        write_attr(&dir.join("period"), &self.period_ns.to_string(), RovLinkError::Pwm)?;
        write_attr(&dir.join("enable"), "1", RovLinkError::Pwm)?;

        debug!("PWM channel {} enabled (period {} ns)", channel, self.period_ns);
        self.enabled.insert(channel);
        Ok(())
    }
}

impl PwmOutput for SysfsPwm {
    fn write(&mut self, channel: u32, duty: u16) -> Result<()> {
        self.ensure(channel)?;

        let duty_ns = self.duty_ns(duty);
        write_attr(
            &self.channel_dir(channel).join("duty_cycle"),
            &duty_ns.to_string(),
            RovLinkError::Pwm,
        )
    }
}

fn write_attr(path: &Path, value: &str, err: fn(String) -> RovLinkError) -> Result<()> {
    fs::write(path, value)
        .map_err(|e| err(format!("Failed to write '{}' to {}: {}", value, path.display(), e)))
}
