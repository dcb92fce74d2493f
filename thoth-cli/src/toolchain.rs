//! Running the external assembler and linker.
use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use log::{debug, warn};

use crate::conf::ToolchainConf;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Assemble `asm_path` into an object file and link it into an
/// executable named after the file stem. Returns the executable path.
pub fn assemble_and_link(conf: &ToolchainConf, asm_path: &Path) -> Result<PathBuf> {
    let obj_path = asm_path.with_extension("o");
    let exe_path = asm_path.with_extension("");

    let mut assemble = Command::new(&conf.assembler);
    assemble
        .args(&conf.assembler_args)
        .arg("-o")
        .arg(&obj_path)
        .arg(asm_path);
    run_tool(assemble, conf.timeout())?;

    let mut link = Command::new(&conf.linker);
    link.args(&conf.linker_args)
        .arg("-o")
        .arg(&exe_path)
        .arg(&obj_path);
    let linked = run_tool(link, conf.timeout());

    if !conf.keep_object {
        if let Err(err) = fs::remove_file(&obj_path) {
            warn!("failed to remove {}: {err}", obj_path.display());
        }
    }

    linked.map(|_| exe_path)
}

/// Run a tool to completion, killing it once `timeout` has passed.
///
/// A non-zero exit status fails with the tool's stderr.
fn run_tool(mut command: Command, timeout: Duration) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!("running {command:?}");

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start {program}"))?;

    // Drained on its own thread so a chatty tool can't fill the pipe and stall.
    let stderr = child.stderr.take();
    let reader = thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = stderr {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    });

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to wait on {program}"))?
        {
            break status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            bail!("{program} timed out after {}s", timeout.as_secs_f32());
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stderr = reader.join().unwrap_or_default();
    if !status.success() {
        bail!("{program} failed with {status}\n{}", stderr.trim_end());
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn test_success() {
        assert!(run_tool(shell("exit 0"), Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_failure_carries_stderr() {
        let err = run_tool(shell("echo 'bad operand' >&2; exit 3"), Duration::from_secs(5))
            .unwrap_err()
            .to_string();
        assert!(err.contains("bad operand"), "{err}");
    }

    #[test]
    fn test_timeout_kills_tool() {
        let start = Instant::now();
        let err = run_tool(shell("sleep 5"), Duration::from_millis(100))
            .unwrap_err()
            .to_string();
        assert!(err.contains("timed out"), "{err}");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let command = Command::new("thoth-no-such-assembler");
        assert!(run_tool(command, Duration::from_secs(1)).is_err());
    }
}
