use std::fs::read_to_string;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Deserializer};
use syntonic::config::{ClockConfig, InterfaceConfig, TimestampingMode};
use syntonic::datastructures::common::ClockIdentity;
use syntonic::servo::ServoKind;

use crate::uds::UDS_PATH;

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServoChoice {
    #[default]
    Pi,
    Linreg,
    Nullf,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimestampingChoice {
    #[default]
    Hardware,
    Software,
    Legacy,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub loglevel: LogLevel,
    #[serde(default = "default_domain")]
    pub domain: u8,
    #[serde(default, deserialize_with = "deserialize_clock_identity")]
    pub identity: Option<ClockIdentity>,
    #[serde(default = "default_priority1")]
    pub priority1: u8,
    #[serde(default = "default_priority2")]
    pub priority2: u8,
    #[serde(default)]
    pub slave_only: bool,
    #[serde(default)]
    pub free_running: bool,
    #[serde(default = "default_freq_est_interval")]
    pub freq_est_interval: i32,
    #[serde(default)]
    pub stats_interval: i32,
    #[serde(default)]
    pub clock_description: String,
    #[serde(default)]
    pub servo: ServoChoice,
    #[serde(default)]
    pub timestamping: TimestampingChoice,
    #[serde(default = "default_uds_path")]
    pub uds_path: PathBuf,
    #[serde(rename = "port", default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PortConfig {
    pub interface: String,
    /// Time-stamping interface when it differs from `interface` (bonds).
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default = "default_fault_reset_interval")]
    pub fault_reset_interval: i8,
    #[serde(default)]
    pub hardware_clock: Option<u32>,
}

fn deserialize_clock_identity<'de, D>(deserializer: D) -> Result<Option<ClockIdentity>, D::Error>
where
    D: Deserializer<'de>,
{
    use hex::FromHex;
    use serde::de::Error;
    let raw: String = Deserialize::deserialize(deserializer)?;
    Ok(Some(ClockIdentity(<[u8; 8]>::from_hex(raw).map_err(
        |e| D::Error::custom(format!("Invalid clock identifier: {}", e)),
    )?)))
}

impl Config {
    /// Parse config from file
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let meta = std::fs::metadata(file).map_err(ConfigError::Io)?;
        let perm = meta.permissions();

        if perm.mode() as libc::mode_t & libc::S_IWOTH != 0 {
            warn!("Unrestricted config file permissions: Others can write.");
        }

        let contents = read_to_string(file).map_err(ConfigError::Io)?;
        let config: Config = toml::de::from_str(&contents).map_err(ConfigError::Toml)?;
        config.warn_when_unreasonable();
        Ok(config)
    }

    /// Warns about unreasonable config values
    pub fn warn_when_unreasonable(&self) {
        if self.ports.is_empty() {
            warn!("No ports configured.");
        }

        if self.ports.len() > syntonic::clock::MAX_PORTS {
            warn!("Too many ports are configured.");
        }

        if self.identity.is_none() {
            warn!("No clock identity configured, using all zeroes.");
        }
    }

    /// The clock-wide options for the aggregator. `utc_timescale` is
    /// decided by the caller based on which timekeeper it opened.
    pub fn clock_config(&self, utc_timescale: bool) -> ClockConfig {
        ClockConfig {
            identity: self.identity.unwrap_or_default(),
            domain_number: self.domain,
            priority1: self.priority1,
            priority2: self.priority2,
            slave_only: self.slave_only,
            free_running: self.free_running,
            utc_timescale,
            freq_est_interval: self.freq_est_interval,
            stats_interval: self.stats_interval,
            user_description: self.clock_description.clone(),
            servo: match self.servo {
                ServoChoice::Pi => ServoKind::Pi,
                ServoChoice::Linreg => ServoKind::LinReg,
                ServoChoice::Nullf => ServoKind::NullF,
            },
            timestamping: match self.timestamping {
                TimestampingChoice::Hardware => TimestampingMode::Hardware,
                TimestampingChoice::Software => TimestampingMode::Software,
                TimestampingChoice::Legacy => TimestampingMode::Legacy,
            },
            ..ClockConfig::default()
        }
    }

    /// Per-interface options in port order.
    pub fn interface_configs(&self) -> Vec<InterfaceConfig> {
        self.ports
            .iter()
            .map(|p| InterfaceConfig {
                name: p.interface.clone(),
                label: p.label.clone(),
                remote: p.remote.clone(),
                fault_reset_interval: p.fault_reset_interval,
                hardware_clock: p.hardware_clock,
            })
            .collect()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => writeln!(f, "io error while reading config: {e}"),
            ConfigError::Toml(e) => writeln!(f, "config toml parsing error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn default_domain() -> u8 {
    0
}

fn default_priority1() -> u8 {
    128
}

fn default_priority2() -> u8 {
    128
}

fn default_freq_est_interval() -> i32 {
    1
}

fn default_fault_reset_interval() -> i8 {
    4
}

fn default_uds_path() -> PathBuf {
    PathBuf::from(UDS_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal amount of config results in default values
    #[test]
    fn minimal_config() {
        const MINIMAL_CONFIG: &str = r#"
[[port]]
interface = "enp0s31f6"
"#;

        let expected_port = PortConfig {
            interface: "enp0s31f6".to_owned(),
            label: None,
            remote: None,
            fault_reset_interval: 4,
            hardware_clock: None,
        };

        let expected = Config {
            loglevel: LogLevel::Info,
            domain: 0,
            identity: None,
            priority1: 128,
            priority2: 128,
            slave_only: false,
            free_running: false,
            freq_est_interval: 1,
            stats_interval: 0,
            clock_description: String::new(),
            servo: ServoChoice::Pi,
            timestamping: TimestampingChoice::Hardware,
            uds_path: PathBuf::from(UDS_PATH),
            ports: vec![expected_port],
        };

        let actual = toml::from_str(MINIMAL_CONFIG).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn full_config_maps_to_clock_config() {
        const CONFIG: &str = r#"
identity = "0011223344556677"
domain = 5
priority1 = 10
priority2 = 20
slave-only = true
free-running = true
freq-est-interval = 3
stats-interval = 4
clock-description = "lab clock"
servo = "linreg"
timestamping = "software"
uds-path = "/tmp/syntonic-test"

[[port]]
interface = "eth0"
label = "bond0"
fault-reset-interval = 2
hardware-clock = 1
"#;

        let config: Config = toml::from_str(CONFIG).unwrap();
        let clock = config.clock_config(true);

        assert_eq!(
            clock.identity,
            ClockIdentity([0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77])
        );
        assert_eq!(clock.domain_number, 5);
        assert_eq!(clock.priority1, 10);
        assert_eq!(clock.priority2, 20);
        assert!(clock.slave_only);
        assert!(clock.free_running);
        assert!(clock.utc_timescale);
        assert_eq!(clock.freq_est_interval, 3);
        assert_eq!(clock.stats_interval, 4);
        assert_eq!(clock.user_description, "lab clock");
        assert_eq!(clock.servo, ServoKind::LinReg);
        assert_eq!(clock.timestamping, TimestampingMode::Software);

        let interfaces = config.interface_configs();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].name, "eth0");
        assert_eq!(interfaces[0].label.as_deref(), Some("bond0"));
        assert_eq!(interfaces[0].fault_reset_interval, 2);
        assert_eq!(interfaces[0].hardware_clock, Some(1));
    }
}
