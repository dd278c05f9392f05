//! Command-line and TOML configuration, merged as CLI > file > defaults.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use thiserror::Error;
use wheel_core::api::DEFAULT_PORT;
use wheel_core::config::{ConfigError, POTENTIOMETER, WheelConfig};

use crate::analog::{DEFAULT_IIO_DEVICE, HostAnalog, IioAdc, SimulatedPot};

/// Where pulse events come from.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Line commands typed on standard input.
    #[default]
    Stdin,
    /// No pulse producer; the service only answers queries.
    None,
}

/// Which potentiometer backend answers `/potentiometer`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalogKind {
    /// ADS1115 through Linux IIO sysfs.
    Iio,
    /// In-memory voltage driven by the `pot` feed command.
    #[default]
    Simulated,
}

#[derive(Debug, Parser)]
#[command(
    name = "wheel-server",
    version,
    about = "Serves wheel speed and potentiometer readings over HTTP"
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on [default: 0.0.0.0].
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Port to listen on [default: 8081].
    #[arg(long)]
    pub port: Option<u16>,

    /// Pulse source.
    #[arg(long, value_enum)]
    pub feed: Option<FeedKind>,

    /// Potentiometer backend.
    #[arg(long, value_enum)]
    pub analog: Option<AnalogKind>,

    /// Log filter directive, e.g. `debug` or `wheel_server=trace`; overrides `RUST_LOG`.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub wheel: WheelSection,
    pub analog: AnalogSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub feed: Option<FeedKind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WheelSection {
    pub circumference: Option<f32>,
    pub ceiling: Option<u8>,
    pub staleness_ms: Option<u64>,
    pub idle_rearm_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalogSection {
    pub source: Option<AnalogKind>,
    pub iio_device: Option<PathBuf>,
    pub simulated_volts: Option<f32>,
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid [wheel] settings")]
    Wheel(#[source] ConfigError),
    #[error("simulated potentiometer voltage must be finite")]
    SimulatedVolts,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Potentiometer backend after merging.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalogSettings {
    Iio { device: PathBuf },
    Simulated { volts: f32 },
}

impl AnalogSettings {
    pub fn build(&self) -> HostAnalog {
        match self {
            AnalogSettings::Iio { device } => {
                HostAnalog::Iio(IioAdc::new(device, POTENTIOMETER.ads1115_channel))
            }
            AnalogSettings::Simulated { volts } => {
                HostAnalog::Simulated(SimulatedPot::new(*volts))
            }
        }
    }
}

/// Fully resolved service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind: SocketAddr,
    pub feed: FeedKind,
    pub analog: AnalogSettings,
    pub wheel: WheelConfig,
}

impl Settings {
    /// Loads the file named by `--config`, if any, and merges it with the CLI.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigLoadError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigLoadError> {
        let ip = cli
            .bind
            .or(file.server.bind)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = cli.port.or(file.server.port).unwrap_or(DEFAULT_PORT);
        let feed = cli.feed.or(file.server.feed).unwrap_or_default();

        let analog = match cli.analog.or(file.analog.source).unwrap_or_default() {
            AnalogKind::Iio => AnalogSettings::Iio {
                device: file
                    .analog
                    .iio_device
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_IIO_DEVICE)),
            },
            AnalogKind::Simulated => {
                let volts = file.analog.simulated_volts.unwrap_or(0.0);
                if !volts.is_finite() {
                    return Err(ConfigLoadError::SimulatedVolts);
                }
                AnalogSettings::Simulated { volts }
            }
        };

        let defaults = WheelConfig::DEFAULT;
        let wheel = WheelConfig::new(
            file.wheel
                .circumference
                .unwrap_or(defaults.wheel_circumference),
            file.wheel.ceiling.unwrap_or(defaults.speed_ceiling),
        )
        .map_err(ConfigLoadError::Wheel)?
        .with_marker_staleness(file.wheel.staleness_ms.map(Duration::from_millis))
        .with_idle_rearm(file.wheel.idle_rearm_ms.map(Duration::from_millis));

        Ok(Self {
            bind: SocketAddr::new(ip, port),
            feed,
            analog,
            wheel,
        })
    }
}
