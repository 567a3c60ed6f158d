//! Repository locators: external VCS clone under a timeout.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::error::{FetchError, FetchResult};

/// Clone `url` into the (empty) directory `dest`.
///
/// The locator is passed after `--` and interactive credential prompts are
/// disabled, so a hostile locator can neither inject options nor hang the
/// run waiting for input. The child is killed if the timeout fires.
pub(crate) async fn clone_repository(
    program: &str,
    url: &str,
    dest: &Path,
    timeout_secs: u64,
    shallow: bool,
) -> FetchResult<()> {
    let mut cmd = Command::new(program);
    cmd.arg("clone").arg("--quiet");
    if shallow {
        cmd.args(["--depth", "1"]);
    }
    cmd.arg("--")
        .arg(url)
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            FetchError::ToolMissing {
                program: program.to_string(),
            }
        } else {
            FetchError::Io(e)
        }
    })?;

    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| FetchError::Timeout { secs: timeout_secs })??;

    if !output.status.success() {
        return Err(FetchError::CloneFailed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!(url = %url, dest = %dest.display(), "repository cloned");
    Ok(())
}
