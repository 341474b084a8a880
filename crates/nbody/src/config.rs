//! Runtime configuration.
//!
//! Settings are read from an optional `config.toml` next to the executable and
//! then overridden from the command line:
//!
//! ```toml
//! [window]
//! width = 1280
//! height = 720
//!
//! [graphics]
//! vsync = true
//! debug_layer = true
//!
//! [simulation]
//! particle_count = 4096
//! paused = false
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gfx::nbody::THREAD_GROUP_SIZE;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Textured triangle".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub vsync: bool,
    pub debug_layer: bool,
    pub gpu_validation: bool,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            debug_layer: cfg!(debug_assertions),
            gpu_validation: false,
            // DirectX::Colors::DarkGray
            clear_color: [0.662_745, 0.662_745, 0.662_745, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub particle_count: u32,
    pub disc_radius: f32,
    pub gravity: f32,
    pub softening: f32,
    pub damping: f32,
    /// Seconds of simulated time advanced by one compute dispatch in fixed-step mode.
    pub time_step: f32,
    /// Run as many `time_step` steps per frame as wall-clock time requires instead of
    /// one step of the measured frame time.
    pub fixed_step: bool,
    pub paused: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            particle_count: 4096,
            disc_radius: 4.0,
            gravity: 0.0002,
            softening: 0.05,
            damping: 1.0,
            time_step: 1.0 / 60.0,
            fixed_step: true,
            paused: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Falls back to the defaults when the file does not exist. A file that exists but
    /// fails to parse is still an error.
    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn client_width(&self) -> u32 {
        self.window.width
    }

    pub fn client_height(&self) -> u32 {
        self.window.height
    }

    pub fn debug_layer_enabled(&self) -> bool {
        self.graphics.debug_layer || self.graphics.gpu_validation
    }

    pub fn gpu_validation_enabled(&self) -> bool {
        self.graphics.gpu_validation
    }

    /// Applies `--width <n>`, `--height <n>`, `--particles <n>`, `--no-vsync`,
    /// `--no-debug` and `--paused`. `--config <path>` is consumed by [`parse_args`].
    pub fn apply_args<I>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "--width" => self.window.width = next_number(&mut args, "window.width")?,
                "--height" => self.window.height = next_number(&mut args, "window.height")?,
                "--particles" => {
                    self.simulation.particle_count =
                        next_number(&mut args, "simulation.particle_count")?
                }
                "--no-vsync" => self.graphics.vsync = false,
                "--no-debug" => {
                    self.graphics.debug_layer = false;
                    self.graphics.gpu_validation = false;
                }
                "--paused" => self.simulation.paused = true,
                "--config" => {
                    args.next();
                }
                other => {
                    return Err(Error::InvalidConfig {
                        field: "arguments",
                        reason: format!("unknown argument `{other}`"),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::InvalidConfig {
                field: "window.width/height",
                reason: "window dimensions must be greater than zero".into(),
            });
        }

        let count = self.simulation.particle_count;
        if count == 0 || count % THREAD_GROUP_SIZE != 0 {
            return Err(Error::InvalidConfig {
                field: "simulation.particle_count",
                reason: format!("{count} is not a positive multiple of {THREAD_GROUP_SIZE}"),
            });
        }

        if !(self.simulation.time_step > 0.0) {
            return Err(Error::InvalidConfig {
                field: "simulation.time_step",
                reason: "the time step must be greater than zero".into(),
            });
        }

        if !(self.simulation.disc_radius > 0.0) {
            return Err(Error::InvalidConfig {
                field: "simulation.disc_radius",
                reason: "the disc radius must be greater than zero".into(),
            });
        }

        Ok(())
    }
}

fn next_number<I, T>(args: &mut I, field: &'static str) -> Result<T>
where
    I: Iterator,
    I::Item: AsRef<str>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = args.next() else {
        return Err(Error::InvalidConfig {
            field,
            reason: "missing value".into(),
        });
    };
    value.as_ref().parse().map_err(|e| Error::InvalidConfig {
        field,
        reason: format!("`{}`: {e}", value.as_ref()),
    })
}

/// Loads the config file (`--config <path>` or `config.toml`), applies the remaining
/// command-line overrides and validates the result. The first item is the program name.
pub fn parse_args(args: impl Iterator<Item = String>) -> Result<Config> {
    let args: Vec<String> = args.skip(1).collect();

    let path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());

    let mut config = Config::from_file_or_default(&path)?;
    config.apply_args(&args)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.client_width(), 1280);
        assert_eq!(config.client_height(), 720);
        assert!(config.graphics.vsync);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 640

            [simulation]
            particle_count = 512

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.simulation.particle_count, 512);
        assert_eq!(config.simulation.gravity, SimulationConfig::default().gravity);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn malformed_file_is_rejected() {
        let result = Config::from_toml_str("[window]\nwidth = \"wide\"");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::from_file_or_default("this/file/does/not/exist.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn command_line_overrides() {
        let mut config = Config::default();
        config
            .apply_args([
                "--width",
                "800",
                "--height",
                "600",
                "--particles",
                "1024",
                "--no-vsync",
                "--no-debug",
                "--paused",
            ])
            .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.simulation.particle_count, 1024);
        assert!(!config.graphics.vsync);
        assert!(!config.debug_layer_enabled());
        assert!(config.simulation.paused);
    }

    #[test]
    fn config_path_is_not_an_override() {
        let mut config = Config::default();
        config.apply_args(["--config", "--width"]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        let mut config = Config::default();
        let err = config.apply_args(["--particle", "512"]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { field: "arguments", .. }));
        assert!(err.to_string().contains("--particle"));

        assert!(config.apply_args(["512"]).is_err());
        assert_eq!(config.simulation.particle_count, 4096);
    }

    #[test]
    fn bad_number_names_the_field() {
        let mut config = Config::default();
        let err = config.apply_args(["--width", "big"]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { field: "window.width", .. }));

        let err = config.apply_args(["--height"]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { field: "window.height", .. }));
    }

    #[test]
    fn gpu_validation_implies_debug_layer() {
        let mut config = Config::default();
        config.graphics.debug_layer = false;
        config.graphics.gpu_validation = true;
        assert!(config.debug_layer_enabled());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.window.height = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.particle_count = THREAD_GROUP_SIZE + 1;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfig { field: "simulation.particle_count", .. }
        ));

        let mut config = Config::default();
        config.simulation.particle_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.time_step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn shipped_config_is_valid() {
        let config = Config::from_toml_str(include_str!("../config.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.particle_count, 4096);
    }
}
