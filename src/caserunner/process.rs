//! Blocking subprocess execution with combined stdout/stderr capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::environment::ResolvedCall;
use crate::SampleError;

/// Result of a finished process call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    pub return_code: i32,
    pub output: String,
}

/// Runs `call` through the platform shell and waits for it to exit.
///
/// Without a `timeout` this blocks until the child exits. With one, a child still
/// running when it expires is killed and the call fails with a `Call` error.
pub fn run_command(call: &ResolvedCall, timeout: Option<Duration>) -> Result<CallOutput, SampleError> {
    let mut cmd = shell_command(&call.command);
    if let Some(dir) = &call.working_dir {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    debug!("spawning: {}", call.command);
    let mut child = cmd
        .spawn()
        .map_err(|e| err_msg!(Call, "could not start \"{}\"", call.command).with_source(e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| err_msg!(Call, "no output pipe for \"{}\"", call.command))?;

    let Some(limit) = timeout else {
        let mut raw = Vec::new();
        stdout.read_to_end(&mut raw)?;
        let status = child.wait()?;
        return Ok(finish(status, &raw));
    };

    let reader = thread::spawn(move || {
        let mut raw = Vec::new();
        stdout.read_to_end(&mut raw).map(|_| raw)
    });

    match child.wait_timeout(limit)? {
        Some(status) => {
            let raw = reader
                .join()
                .map_err(|_| err_msg!(Call, "output reader for \"{}\" panicked", call.command))??;
            Ok(finish(status, &raw))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(err_msg!(
                Call,
                "call timed out after {} s: {}",
                limit.as_secs(),
                call.command
            ))
        }
    }
}

fn finish(status: ExitStatus, raw: &[u8]) -> CallOutput {
    CallOutput {
        return_code: exit_code(status),
        output: String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(format!("exec 2>&1\n{}", command));
    cmd
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(format!("{} 2>&1", command));
    cmd
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| -sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
