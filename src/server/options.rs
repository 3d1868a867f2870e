use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Rejected server parameters. Raised while configuring, never at launch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be blank")]
    Blank { field: &'static str },

    #[error("{field} must be an integer, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    #[error("{field} must be in range 1 to 65535, got {value}")]
    PortRange { field: &'static str, value: i64 },

    #[error("Controller address must contain at least one colon, got '{0}'")]
    AddressMissingDelimiter(String),

    #[error("Record file '{0}' cannot contain forward slashes")]
    RecordFileSlash(String),
}

/// A TCP port in `1..=65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(u16);

impl Port {
    pub fn new(field: &'static str, value: i64) -> Result<Self, ValidationError> {
        u16::try_from(value)
            .ok()
            .filter(|port| *port != 0)
            .map(Port)
            .ok_or(ValidationError::PortRange { field, value })
    }

    pub fn parse(field: &'static str, value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Blank { field });
        }
        let number = trimmed
            .parse::<i64>()
            .map_err(|_| ValidationError::NotAnInteger {
                field,
                value: value.to_string(),
            })?;
        Self::new(field, number)
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote-control address handed to the server, e.g.
/// `tcp:host=0.0.0.0,port=5000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerAddress(String);

impl ControllerAddress {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::Blank {
                field: "Controller address",
            });
        }
        if !value.contains(':') {
            return Err(ValidationError::AddressMissingDelimiter(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recording behaviour of the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordFile {
    #[default]
    Off,
    /// Record with the server's default file name (`-r`).
    Default,
    /// Record into this file name (`--record=NAME`); may contain strftime
    /// placeholders and spaces but no directory separators.
    Named(String),
}

impl RecordFile {
    pub fn named(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::Blank {
                field: "Record file",
            });
        }
        if name.contains('/') {
            return Err(ValidationError::RecordFileSlash(name.to_string()));
        }
        Ok(RecordFile::Named(name.to_string()))
    }

    /// Command line flag for this setting, if any.
    pub fn to_flag(&self) -> Option<String> {
        match self {
            RecordFile::Off => None,
            RecordFile::Default => Some("-r".to_string()),
            RecordFile::Named(name) => Some(format!("--record={}", name)),
        }
    }
}

/// Validated launch parameters for `gst-switch-srv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Directory containing the server binary; `$PATH` is searched if unset.
    pub path: Option<PathBuf>,
    pub video_port: Port,
    pub audio_port: Port,
    pub controller_address: ControllerAddress,
    pub record_file: RecordFile,
    pub video_format: Option<String>,
}

pub const DEFAULT_VIDEO_PORT: u16 = 3000;
pub const DEFAULT_AUDIO_PORT: u16 = 4000;
pub const DEFAULT_CONTROLLER_ADDRESS: &str = "tcp:host=0.0.0.0,port=5000";

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            path: None,
            video_port: Port(DEFAULT_VIDEO_PORT),
            audio_port: Port(DEFAULT_AUDIO_PORT),
            controller_address: ControllerAddress(DEFAULT_CONTROLLER_ADDRESS.to_string()),
            record_file: RecordFile::Off,
            video_format: None,
        }
    }
}

impl ServerOptions {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    pub fn with_video_port(mut self, port: i64) -> Result<Self, ValidationError> {
        self.video_port = Port::new("Video port", port)?;
        Ok(self)
    }

    pub fn with_audio_port(mut self, port: i64) -> Result<Self, ValidationError> {
        self.audio_port = Port::new("Audio port", port)?;
        Ok(self)
    }

    pub fn with_controller_address(mut self, address: &str) -> Result<Self, ValidationError> {
        self.controller_address = ControllerAddress::parse(address)?;
        Ok(self)
    }

    pub fn with_record_file(mut self, record_file: RecordFile) -> Self {
        self.record_file = record_file;
        self
    }

    pub fn with_video_format(mut self, format: impl Into<String>) -> Self {
        self.video_format = Some(format.into());
        self
    }
}
