use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

/// Upper bound for any helper command. `osascript` can sit on a permission
/// prompt forever; such a child is killed once this expires.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const WAIT_STEP: Duration = Duration::from_millis(10);

/// Runs `program` to completion and returns its trimmed stdout.
pub fn run_command(program: &str, args: &[&str]) -> Result<String> {
    run_command_within(program, args, COMMAND_TIMEOUT)
}

pub fn run_command_within(program: &str, args: &[&str], limit: Duration) -> Result<String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    let output = wait_with_deadline(child, program, limit)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Runs `program`, feeding `input` on stdin.
pub fn run_command_with_input(program: &str, args: &[&str], input: &str) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    {
        let mut stdin = child
            .stdin
            .take()
            .with_context(|| format!("{program} stdin unavailable"))?;
        stdin
            .write_all(input.as_bytes())
            .with_context(|| format!("failed to write to {program}"))?;
    }

    wait_with_deadline(child, program, COMMAND_TIMEOUT).map(|_| ())
}

/// Polls the child until it exits or `limit` passes, then kills it. Helper
/// output is a few lines, so reading the pipes after exit cannot deadlock.
fn wait_with_deadline(mut child: Child, program: &str, limit: Duration) -> Result<Output> {
    let start = Instant::now();
    let status = loop {
        match child
            .try_wait()
            .with_context(|| format!("failed to wait for {program}"))?
        {
            Some(status) => break status,
            None if start.elapsed() >= limit => {
                let _ = child.kill();
                let _ = child.wait();
                bail!("{program} did not finish within {}ms", limit.as_millis());
            }
            None => thread::sleep(WAIT_STEP),
        }
    };

    let mut stdout = Vec::new();
    if let Some(mut pipe) = child.stdout.take() {
        pipe.read_to_end(&mut stdout)
            .with_context(|| format!("failed to read {program} output"))?;
    }
    let mut stderr = Vec::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_end(&mut stderr);
    }

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        bail!("{program} exited with {}: {}", status, stderr.trim());
    }
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}
