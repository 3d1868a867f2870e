use std::path::Path;
use std::process::Command;

use crate::monitor::ProcessControlError;

/// Run `make -C <tools_dir> coverage` to turn gcov counters into reports.
pub fn make_coverage(tools_dir: Option<&Path>) -> Result<(), ProcessControlError> {
    let dir = tools_dir.ok_or_else(|| ProcessControlError::Coverage {
        message: "tools directory is not configured".to_string(),
    })?;

    tracing::info!("Starting process make -C {} coverage", dir.display());
    let output = Command::new("make")
        .arg("-C")
        .arg(dir)
        .arg("coverage")
        .output()
        .map_err(|e| ProcessControlError::Coverage {
            message: format!("cannot run make: {}", e),
        })?;

    tracing::debug!("{}", String::from_utf8_lossy(&output.stdout));
    if !output.status.success() {
        return Err(ProcessControlError::Coverage {
            message: format!(
                "make exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_tools_dir() {
        let err = make_coverage(None).unwrap_err();
        assert!(err.to_string().contains("tools directory is not configured"));
    }
}
