//! Command line assembly for the switch server.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::monitor::LaunchError;
use crate::server::options::ServerOptions;

/// Name of the server executable.
pub const SERVER_BINARY: &str = "gst-switch-srv";

/// Builder for the argv passed to the server process.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    args: Vec<String>,
}

impl ServerCommand {
    /// Start with the resolved executable.
    pub fn new(executable: &Path) -> Self {
        Self {
            args: vec![executable.to_string_lossy().into_owned()],
        }
    }

    /// Free-form GStreamer option string, passed as one argument verbatim.
    pub fn with_gst_option(mut self, option: &str) -> Self {
        if !option.is_empty() {
            self.args.push(option.to_string());
        }
        self
    }

    pub fn with_options(mut self, options: &ServerOptions) -> Self {
        self.args
            .push(format!("--video-input-port={}", options.video_port));
        self.args
            .push(format!("--audio-input-port={}", options.audio_port));
        self.args
            .push(format!("--controller-address={}", options.controller_address));
        self.args.extend(options.record_file.to_flag());
        if let Some(format) = &options.video_format {
            self.args.push(format!("--video-format={}", format));
        }
        self
    }

    pub fn build(self) -> Vec<String> {
        self.args
    }
}

/// Locate the server binary: inside `path` if given, else on `$PATH`.
pub fn resolve_executable(path: Option<&Path>) -> Result<PathBuf, LaunchError> {
    resolve_executable_in(path, env::var_os("PATH"))
}

/// Like [`resolve_executable`], searching `search_path` instead of `$PATH`.
pub fn resolve_executable_in(
    path: Option<&Path>,
    search_path: Option<OsString>,
) -> Result<PathBuf, LaunchError> {
    if let Some(dir) = path {
        return Ok(dir.join(SERVER_BINARY));
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(SERVER_BINARY, search_path, cwd).map_err(|e| {
        tracing::debug!("{} not found on search path: {}", SERVER_BINARY, e);
        LaunchError::NotFound {
            program: SERVER_BINARY.to_string(),
        }
    })
}

/// Full argv for launching the server with `options`.
pub fn build_command(
    options: &ServerOptions,
    gst_option: &str,
) -> Result<Vec<String>, LaunchError> {
    let executable = resolve_executable(options.path.as_deref())?;
    Ok(ServerCommand::new(&executable)
        .with_gst_option(gst_option)
        .with_options(options)
        .build())
}
