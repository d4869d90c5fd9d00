//! # Shell runner
//!
//! A thin wrapper over spawning a shell command, used by task bodies that
//! need to invoke an external program (the original engine's tasks mostly
//! shelled out to small scripts rather than doing work in-process). Two
//! extras carried over from the source engine: capturing stdout/stderr for
//! diagnostics, and optionally writing the exact command run to a
//! `.command.sh` file next to the task's working directory, so a failed run
//! can be reproduced by hand.

use crate::error::ShellError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Create `dir` if it doesn't exist yet and resolve it to an absolute path,
/// so both the spawned process and the `# cwd:` reproducibility comment see
/// the same unambiguous location regardless of the caller's own cwd.
fn resolve_cwd(dir: &Path, command: &str) -> Result<PathBuf, ShellError> {
    std::fs::create_dir_all(dir).map_err(|e| ShellError {
        command: command.to_string(),
        code: -1,
        stdout: String::new(),
        stderr: format!("failed to create working directory {}: {e}", dir.display()),
    })?;
    dir.canonicalize().map_err(|e| ShellError {
        command: command.to_string(),
        code: -1,
        stdout: String::new(),
        stderr: format!("failed to resolve working directory {}: {e}", dir.display()),
    })
}

/// Run `command` through `/bin/sh -c`, in `cwd` if given.
///
/// If `command_log_file` is set, the literal command line is written there
/// first (with a shebang), so a failing task leaves behind a script a human
/// can re-run directly.
pub fn run_shell(command: &str, cwd: Option<&Path>, command_log_file: Option<&Path>) -> Result<String, ShellError> {
    let cwd = cwd.map(|d| resolve_cwd(d, command)).transpose()?;
    let cwd = cwd.as_deref();

    if let Some(log_path) = command_log_file {
        let cwd_comment = cwd.map(|d| format!("# cwd: {}\n", d.display())).unwrap_or_default();
        let script = format!("#!/bin/sh\nset -e\n{cwd_comment}{command}\n");
        // Best-effort: failing to write the reproducibility log should never
        // stop the command itself from running.
        if std::fs::write(log_path, script).is_ok() {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(log_path, std::fs::Permissions::from_mode(0o755));
            }
        } else {
            tracing::warn!(path = %log_path.display(), "failed to write reproducible command log");
        }
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().map_err(|e| ShellError {
        command: command.to_string(),
        code: -1,
        stdout: String::new(),
        stderr: format!("failed to spawn shell: {e}"),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ShellError {
            command: command.to_string(),
            code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        });
    }

    Ok(stdout)
}
