// src/installer/process.rs

//! Bounded child process execution for self-tests and hooks

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Captured result of a finished or timed-out command
#[derive(Debug)]
pub struct CommandOutput {
    /// `None` when the command was killed after the timeout
    pub status: Option<ExitStatus>,
    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    /// Human-readable exit description
    pub fn describe_status(&self, timeout: Duration) -> String {
        match self.status {
            Some(status) => match status.code() {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            },
            None => format!("timed out after {} seconds", timeout.as_secs()),
        }
    }
}

/// Run `argv` with stdin closed, killing it after `timeout`
///
/// `bin_dir` is prepended to `PATH` so installed tools can find each other.
/// On Unix the command leads its own process group, and a timeout kills the
/// whole group so forked helpers cannot hold the output pipes open.
pub fn run_bounded(
    argv: &[String],
    bin_dir: &Path,
    timeout: Duration,
) -> io::Result<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

    debug!("Executing: {} {:?}", program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .env("PATH", search_path(bin_dir))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn()?;

    // Drain both pipes on their own threads so a chatty child cannot block
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => Some(status),
        None => {
            kill_group(&mut child);
            let _ = child.wait();
            None
        }
    };

    let mut output = String::new();
    for reader in [stdout, stderr].into_iter().flatten() {
        let bytes = reader.join().unwrap_or_default();
        output.push_str(&String::from_utf8_lossy(&bytes));
    }

    Ok(CommandOutput { status, output })
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!("killpg({}) failed: {}", pid, e);
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn search_path(bin_dir: &Path) -> OsString {
    let mut paths = vec![bin_dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    std::env::join_paths(paths).unwrap_or_else(|_| bin_dir.as_os_str().to_os_string())
}
