use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Errors from the controller facade.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The transport could not deliver the call or subscription.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected reply to '{method}': {reply}")]
    UnexpectedReply { method: String, reply: Value },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Output layout of the composite channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeMode {
    None = 0,
    Pip = 1,
    DualPreview = 2,
    DualEqual = 3,
}

impl CompositeMode {
    pub const ALL: [CompositeMode; 4] = [
        CompositeMode::None,
        CompositeMode::Pip,
        CompositeMode::DualPreview,
        CompositeMode::DualEqual,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for CompositeMode {
    type Error = ControllerError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.code() == code)
            .ok_or_else(|| ControllerError::InvalidArgument(format!("unknown composite mode {}", code)))
    }
}

impl FromStr for CompositeMode {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompositeMode::None),
            "pip" => Ok(CompositeMode::Pip),
            "preview" | "dual_preview" => Ok(CompositeMode::DualPreview),
            "equal" | "dual_equal" => Ok(CompositeMode::DualEqual),
            other => Err(ControllerError::InvalidArgument(format!(
                "unknown composite mode '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositeMode::None => "none",
            CompositeMode::Pip => "pip",
            CompositeMode::DualPreview => "dual_preview",
            CompositeMode::DualEqual => "dual_equal",
        };
        f.write_str(name)
    }
}

/// Logical channel a source port can be switched onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    VideoA,
    VideoB,
    Audio,
}

impl Channel {
    /// Wire value: the ASCII code of `A`, `B` or `a`.
    pub fn code(self) -> i64 {
        match self {
            Channel::VideoA => i64::from(b'A'),
            Channel::VideoB => i64::from(b'B'),
            Channel::Audio => i64::from(b'a'),
        }
    }
}

impl FromStr for Channel {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video-a" | "a" => Ok(Channel::VideoA),
            "video-b" | "b" => Ok(Channel::VideoB),
            "audio" => Ok(Channel::Audio),
            other => Err(ControllerError::InvalidArgument(format!(
                "unknown channel '{}'",
                other
            ))),
        }
    }
}

/// One preview output announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewPort {
    pub port: i64,
    /// What the port serves (nothing, video or audio).
    pub serve: i64,
    /// Server-side case type of the preview.
    pub kind: i64,
}

impl PreviewPort {
    pub fn from_args(args: &[Value]) -> Option<Self> {
        match args {
            [port, serve, kind, ..] => Some(Self {
                port: port.as_i64()?,
                serve: serve.as_i64()?,
                kind: kind.as_i64()?,
            }),
            _ => None,
        }
    }
}

/// Parse the server's preview list, e.g. `"[(3003, 1, 7), (3004, 1, 8)]"`.
///
/// A JSON array of `[port, serve, type]` triples is accepted as well.
pub fn parse_preview_ports(reply: &Value) -> Option<Vec<PreviewPort>> {
    match reply {
        Value::String(text) => {
            let numbers = text
                .split(|c: char| !(c.is_ascii_digit() || c == '-'))
                .filter(|token| !token.is_empty())
                .map(str::parse::<i64>)
                .collect::<Result<Vec<_>, _>>()
                .ok()?;
            if numbers.len() % 3 != 0 {
                return None;
            }
            Some(
                numbers
                    .chunks_exact(3)
                    .map(|t| PreviewPort {
                        port: t[0],
                        serve: t[1],
                        kind: t[2],
                    })
                    .collect(),
            )
        }
        Value::Array(items) => items
            .iter()
            .map(|item| PreviewPort::from_args(item.as_array()?))
            .collect(),
        _ => None,
    }
}
