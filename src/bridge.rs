//! Handing an import request to the external authoring tool.
//!
//! The request is written as JSON to a scratch directory and the tool is run
//! as `program [args..] --request <file> --result <file>`. The tool writes a
//! result document that is read back once it exits.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;

use crate::request::{self, ImportRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} did not finish within {}s and was killed", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("Malformed result document {path}: {message}")]
    BadResult { path: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What the tool reports back.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ImportReport {
    pub imported: u32,
    pub failed: u32,
    pub messages: Vec<String>,
}

/// Result of a run that exited successfully. `report` is `None` when the
/// tool wrote no result document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub report: Option<ImportReport>,
    pub stdout: String,
}

/// How to launch the tool.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Scratch directory removed on drop.
struct WorkDir(PathBuf);

impl WorkDir {
    fn create() -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("{}-{}", crate::APP_NAME, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn join(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.0) {
            log::debug!("Could not remove {}: {}", self.0.display(), e);
        }
    }
}

/// Run the tool on `request` and wait for it, killing it after the timeout.
/// Nothing the tool changed is rolled back on failure.
pub fn run_import(tool: &ToolInvocation, request: &ImportRequest) -> Result<ImportOutcome, BridgeError> {
    let work = WorkDir::create()?;
    let request_path = work.join("request.json");
    let result_path = work.join("result.json");
    let stdout_path = work.join("stdout.log");
    let stderr_path = work.join("stderr.log");

    std::fs::write(&request_path, request::to_json(request)?)?;

    log::info!(
        "Running {} with {} entries (timeout {}s)",
        tool.program,
        request.entries.len(),
        tool.timeout.as_secs()
    );
    let mut child = Command::new(&tool.program)
        .args(&tool.args)
        .arg("--request")
        .arg(&request_path)
        .arg("--result")
        .arg(&result_path)
        .stdin(Stdio::null())
        .stdout(File::create(&stdout_path)?)
        .stderr(File::create(&stderr_path)?)
        .spawn()
        .map_err(|source| BridgeError::Spawn {
            program: tool.program.clone(),
            source,
        })?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if started.elapsed() >= tool.timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BridgeError::Timeout {
                    program: tool.program.clone(),
                    timeout: tool.timeout,
                });
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    let stdout = read_log(&stdout_path);
    if !status.success() {
        return Err(BridgeError::Failed {
            program: tool.program.clone(),
            status,
            stderr: read_log(&stderr_path).trim().to_string(),
        });
    }

    let report = read_report(&result_path)?;
    if report.is_none() {
        log::warn!("{} exited cleanly but wrote no result document", tool.program);
    }
    Ok(ImportOutcome { report, stdout })
}

fn read_log(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

fn read_report(path: &Path) -> Result<Option<ImportReport>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| BridgeError::BadResult {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}
