use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::server::{DEFAULT_AUDIO_PORT, DEFAULT_CONTROLLER_ADDRESS, DEFAULT_LOG_FILE, DEFAULT_VIDEO_PORT};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub harness: HarnessSection,
}

/// Launch parameters of the switch server, validated on use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Directory containing `gst-switch-srv`; `$PATH` when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_video_port")]
    pub video_port: i64,
    #[serde(default = "default_audio_port")]
    pub audio_port: i64,
    #[serde(default = "default_controller_address")]
    pub controller_address: String,
    /// `false`, `true` (server default name) or a file name.
    #[serde(default)]
    pub record: RecordSetting,
    #[serde(default)]
    pub video_format: Option<String>,
    /// Extra option string passed verbatim to the server.
    #[serde(default)]
    pub gst_option: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordSetting {
    Flag(bool),
    Name(String),
}

impl Default for RecordSetting {
    fn default() -> Self {
        RecordSetting::Flag(false)
    }
}

/// Harness behaviour around the server process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessSection {
    /// Mirror server output into `log_file` instead of stderr.
    #[serde(default = "default_log_to_file")]
    pub log_to_file: bool,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Server build tree, needed for coverage collection.
    #[serde(default)]
    pub tools_dir: Option<PathBuf>,
    /// Output that marks the server as ready (default: controller address).
    #[serde(default)]
    pub startup_pattern: Option<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_video_port() -> i64 {
    i64::from(DEFAULT_VIDEO_PORT)
}

fn default_audio_port() -> i64 {
    i64::from(DEFAULT_AUDIO_PORT)
}

fn default_controller_address() -> String {
    DEFAULT_CONTROLLER_ADDRESS.to_string()
}

fn default_log_to_file() -> bool {
    true
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_startup_timeout() -> u64 {
    5
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            path: None,
            video_port: default_video_port(),
            audio_port: default_audio_port(),
            controller_address: default_controller_address(),
            record: RecordSetting::default(),
            video_format: None,
            gst_option: String::new(),
        }
    }
}

impl Default for HarnessSection {
    fn default() -> Self {
        Self {
            log_to_file: default_log_to_file(),
            log_file: default_log_file(),
            tools_dir: None,
            startup_pattern: None,
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}
