//! Shared helpers for the process-level tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use switch_harness::server::SERVER_BINARY;

/// `/bin/sh -c script` as a monitor command.
pub fn shell(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Write an executable shell script named `gst-switch-srv` into `dir`.
///
/// The script sees the usual server arguments in `"$@"`.
pub fn fake_server(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join(SERVER_BINARY);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake server");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake server");
    path
}

/// Fake server that announces its arguments and then idles until signalled.
pub const ANNOUNCE_AND_IDLE: &str = r#"echo "args: $@"
trap 'echo "caught TERM"; exit 0' TERM
while true; do sleep 0.05; done"#;
