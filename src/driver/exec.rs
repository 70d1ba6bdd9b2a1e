//! Subprocess plumbing shared by drivers.
//!
//! Each call gets its own scratch directory. Inputs are written there, the program runs with
//! the directory as its working directory and with stdout/stderr redirected to files (so a
//! chatty program can never block on a full pipe), and the requested output files are read
//! back before the directory is removed.

use super::error::Error;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";
/// `ETXTBSY`: a freshly written executable is still open for writing in a forked child.
const TEXT_FILE_BUSY: i32 = 26;
const SPAWN_ATTEMPTS: usize = 5;

/// One external program call.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Program name looked up on `PATH`, or a path to it.
    pub program: String,
    pub args: Vec<String>,
    /// Files written into the scratch directory before the call, by file name.
    pub inputs: Vec<(String, Vec<u8>)>,
    /// Scratch files read back after a successful call; absent ones are skipped.
    pub outputs: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Parent of the scratch directory; the system temporary directory when `None`.
    pub scratch_root: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn input(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.inputs.push((name.into(), contents.into()));
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }
}

/// Captured result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub stdout: String,
    pub stderr: String,
    /// Harvested output files by name.
    pub files: BTreeMap<String, Vec<u8>>,
    pub elapsed: Duration,
}

impl Completed {
    pub fn file_text(&self, name: &str) -> Option<String> {
        self.files
            .get(name)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Runs an invocation to completion.
///
/// # Errors
///
/// * [`Error::MissingDependency`] when the program cannot be located.
/// * [`Error::Timeout`] when the deadline passes; the process is killed first.
/// * [`Error::Failed`] on a non-zero exit, with the captured stderr.
/// * [`Error::Io`] for scratch-directory and spawn failures.
pub fn run_command(invocation: &Invocation) -> Result<Completed, Error> {
    let program = resolve_program(&invocation.program)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix("mol-forge-");
    let scratch = match &invocation.scratch_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(|e| Error::io("creating a scratch directory", e))?;
    let dir = scratch.path();

    for (name, contents) in &invocation.inputs {
        fs::write(dir.join(name), contents)
            .map_err(|e| Error::io(format!("writing input '{}'", name), e))?;
    }

    let started = Instant::now();
    let status = spawn_and_wait(invocation, &program, dir)?;
    let elapsed = started.elapsed();

    let stdout = read_lossy(&dir.join(STDOUT_FILE))?;
    let stderr = read_lossy(&dir.join(STDERR_FILE))?;

    if !status.success() {
        tracing::debug!(
            program = %invocation.program,
            code = ?status.code(),
            "external program failed"
        );
        return Err(Error::Failed {
            program: invocation.program.clone(),
            code: status.code(),
            stderr: stderr.trim().to_owned(),
        });
    }

    let mut files = BTreeMap::new();
    for name in &invocation.outputs {
        match fs::read(dir.join(name)) {
            Ok(bytes) => {
                files.insert(name.clone(), bytes);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(format!("reading output '{}'", name), e)),
        }
    }

    tracing::debug!(
        program = %invocation.program,
        elapsed_ms = elapsed.as_millis() as u64,
        harvested = files.len(),
        "external program finished"
    );
    Ok(Completed {
        stdout,
        stderr,
        files,
        elapsed,
    })
}

fn spawn_and_wait(invocation: &Invocation, program: &Path, dir: &Path) -> Result<ExitStatus, Error> {
    let stdout = File::create(dir.join(STDOUT_FILE))
        .map_err(|e| Error::io("creating the stdout capture", e))?;
    let stderr = File::create(dir.join(STDERR_FILE))
        .map_err(|e| Error::io("creating the stderr capture", e))?;

    let mut command = Command::new(program);
    command
        .args(&invocation.args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);
    for (key, value) in &invocation.env {
        command.env(key, value);
    }

    let mut attempt = 0;
    let mut child = loop {
        match command.spawn() {
            Ok(child) => break child,
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) && attempt + 1 < SPAWN_ATTEMPTS => {
                attempt += 1;
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(Error::io(format!("starting '{}'", invocation.program), e));
            }
        }
    };

    let started = Instant::now();
    loop {
        let polled = child
            .try_wait()
            .map_err(|e| Error::io(format!("waiting for '{}'", invocation.program), e))?;
        if let Some(status) = polled {
            return Ok(status);
        }
        if let Some(timeout) = invocation.timeout {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(
                    program = %invocation.program,
                    timeout_ms = timeout.as_millis() as u64,
                    "killed external program after timeout"
                );
                return Err(Error::Timeout {
                    program: invocation.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn read_lossy(path: &Path) -> Result<String, Error> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(Error::io("reading captured output", e)),
    }
}

/// Locates `program` on `PATH`, or checks it directly when it contains a path separator.
pub fn resolve_program(program: &str) -> Result<PathBuf, Error> {
    let missing = || Error::MissingDependency {
        program: program.to_owned(),
    };
    if program.is_empty() {
        return Err(missing());
    }

    let direct = Path::new(program);
    if direct.components().count() > 1 || direct.is_absolute() {
        return if is_executable(direct) {
            Ok(direct.to_path_buf())
        } else {
            Err(missing())
        };
    }

    let search = std::env::var_os("PATH").unwrap_or_else(OsString::new);
    std::env::split_paths(&search)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(missing)
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program), dir.join(format!("{}.exe", program))]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
