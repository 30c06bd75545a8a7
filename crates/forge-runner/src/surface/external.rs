use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use forge_bot::{ChatSurface, SurfaceError};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

use crate::config::ValidationError;

/// How to launch the bridge program that owns the real chat window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalOptions {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Calls slower than this are logged; they are not aborted.
    pub timeout_ms: Option<u64>,
}

impl ExternalOptions {
    pub fn from_params(params: &serde_yaml::Value) -> Result<Self, ValidationError> {
        let invalid = |message: &str| ValidationError::InvalidField {
            field: "surface.params".to_string(),
            message: message.to_string(),
        };

        let mapping = params
            .as_mapping()
            .ok_or_else(|| invalid("expected mapping for external params"))?;

        let mut command = None;
        let mut args = Vec::new();
        let mut working_dir = None;
        let mut timeout_ms = None;

        for (key, value) in mapping {
            match key.as_str() {
                Some("command") => {
                    command = Some(
                        value
                            .as_str()
                            .map(|s| s.to_string())
                            .ok_or_else(|| invalid("command must be a string"))?,
                    );
                }
                Some("args") => {
                    let seq = value
                        .as_sequence()
                        .ok_or_else(|| invalid("args must be an array of strings"))?;
                    args = seq
                        .iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect();
                }
                Some("working_dir") => {
                    working_dir = value.as_str().map(PathBuf::from);
                }
                Some("timeout_ms") => {
                    timeout_ms = value.as_u64();
                }
                _ => {}
            }
        }

        let command = command
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| invalid("external surface requires a command"))?;

        Ok(Self {
            command,
            args,
            working_dir,
            timeout_ms,
        })
    }
}

/// Chat surface backed by a bridge program, spawned once per call.
///
/// The bridge receives one JSON request line on stdin and answers on stdout:
/// `{"action":"read"}` expects `{"transcript": "..."}`;
/// `{"action":"send","command":"/강화"}` may answer nothing or
/// `{"ok": false, "error": "..."}`.
pub struct ExternalSurface {
    options: ExternalOptions,
}

impl ExternalSurface {
    pub fn new(options: ExternalOptions) -> Self {
        Self { options }
    }

    fn invoke(&self, request: &BridgeRequest<'_>) -> Result<Vec<u8>, SurfaceError> {
        let mut cmd = Command::new(&self.options.command);
        if !self.options.args.is_empty() {
            cmd.args(&self.options.args);
        }
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|err| SurfaceError::Spawn(err.to_string()))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| SurfaceError::Io("stdin".into()))?;
            serde_json::to_writer(&mut stdin, request)
                .map_err(|err| SurfaceError::Protocol(err.to_string()))?;
            stdin
                .write_all(b"\n")
                .map_err(|err| SurfaceError::Io(err.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| SurfaceError::Io(err.to_string()))?;

        if !output.status.success() {
            return Err(SurfaceError::Status(format!(
                "exit status {}",
                output.status
            )));
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if let Some(timeout) = self.options.timeout_ms
            && elapsed_ms > timeout as f64
        {
            event!(
                target: "forge_runner::external",
                Level::WARN,
                action = request.action,
                elapsed_ms,
                timeout_ms = timeout,
                "bridge call exceeded timeout"
            );
        }

        Ok(output.stdout)
    }
}

impl ChatSurface for ExternalSurface {
    fn read_transcript(&mut self) -> Result<String, SurfaceError> {
        let stdout = self.invoke(&BridgeRequest {
            action: "read",
            command: None,
        })?;
        let response: ReadResponse = serde_json::from_slice(&stdout)
            .map_err(|err| SurfaceError::Protocol(err.to_string()))?;
        Ok(response.transcript)
    }

    fn issue_command(&mut self, command: &str) -> Result<(), SurfaceError> {
        let stdout = self.invoke(&BridgeRequest {
            action: "send",
            command: Some(command),
        })?;
        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        let response: SendResponse = serde_json::from_slice(&stdout)
            .map_err(|err| SurfaceError::Protocol(err.to_string()))?;
        if response.ok == Some(false) {
            return Err(SurfaceError::Protocol(
                response
                    .error
                    .unwrap_or_else(|| "bridge rejected command".to_string()),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<&'a str>,
}

#[derive(Deserialize)]
struct ReadResponse {
    transcript: String,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}
