// ABOUTME: Command invocations inside a running container.
// ABOUTME: Inline shell strings or uploaded scripts, with optional post-run inspection.

use super::{Container, Started};
use crate::error::{Error, Operation, Result};
use crate::hijack::{HijackedStreamPayload, PayloadStream, StreamType, spawn_decoder};
use crate::retry::retry;
use crate::runtime::{DaemonClient, ExecInspection};
use crate::types::ExecId;
use bollard::models::ExecConfig;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Interpreter used for uploaded scripts unless overridden.
pub const DEFAULT_INTERPRETER: &str = "sh";

/// Directory scripts are uploaded into.
pub(crate) const SCRIPT_DIR: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Inline(String),
    Script(PathBuf),
}

#[derive(Debug, Default)]
struct ExecRecord {
    id: Option<ExecId>,
    inspection: Option<ExecInspection>,
}

/// One command to run in a started container.
///
/// Clones share the exec id and inspection result, which are filled in as
/// the exec is created and after its output stream ends.
#[derive(Debug, Clone)]
pub struct Execution {
    pub(crate) command: Command,
    pub(crate) env: Vec<String>,
    pub(crate) inspect: bool,
    pub(crate) interpreter: String,
    record: Arc<Mutex<ExecRecord>>,
}

impl Execution {
    fn new(command: Command) -> Self {
        Self {
            command,
            env: Vec::new(),
            inspect: false,
            interpreter: DEFAULT_INTERPRETER.to_string(),
            record: Arc::default(),
        }
    }

    /// Run `cmd` with `bash -c`.
    pub fn inline(cmd: impl Into<String>) -> Self {
        Self::new(Command::Inline(cmd.into()))
    }

    /// Upload the local file at `path` and run it with the interpreter.
    pub fn script(path: impl Into<PathBuf>) -> Self {
        Self::new(Command::Script(path.into()))
    }

    /// Environment as `KEY=VALUE` entries.
    pub fn with_env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = env.into_iter().map(Into::into).collect();
        self
    }

    /// Fetch the exit code once the output stream ends.
    pub fn with_inspect(mut self) -> Self {
        self.inspect = true;
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn script_path(&self) -> Option<&Path> {
        match &self.command {
            Command::Script(path) => Some(path),
            Command::Inline(_) => None,
        }
    }

    pub fn inline_command(&self) -> Option<&str> {
        match &self.command {
            Command::Inline(cmd) => Some(cmd),
            Command::Script(_) => None,
        }
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn inspect_requested(&self) -> bool {
        self.inspect
    }

    /// Exec id assigned by the daemon, once created.
    pub fn id(&self) -> Option<ExecId> {
        self.record.lock().id.clone()
    }

    /// Exit state fetched after the output stream ended.
    ///
    /// `None` until the stream has been fully consumed, when inspection was
    /// not requested, or when the inspection call failed.
    pub fn inspection(&self) -> Option<ExecInspection> {
        self.record.lock().inspection
    }

    /// Command line run in the container for a given script file name.
    pub(crate) fn argv(&self, script_name: Option<&str>) -> Vec<String> {
        match (&self.command, script_name) {
            (Command::Inline(cmd), _) => vec!["bash".into(), "-c".into(), cmd.clone()],
            (Command::Script(_), Some(name)) => {
                vec![
                    self.interpreter.clone(),
                    format!("{}{}", SCRIPT_DIR, name),
                ]
            }
            (Command::Script(path), None) => {
                vec![self.interpreter.clone(), path.display().to_string()]
            }
        }
    }

    pub(crate) fn set_id(&self, id: ExecId) {
        self.record.lock().id = Some(id);
    }

    pub(crate) fn set_inspection(&self, inspection: ExecInspection) {
        self.record.lock().inspection = Some(inspection);
    }
}

impl Container<Started> {
    /// Run `execution` in the container, returning its combined output.
    ///
    /// A script is uploaded into `/` first. Exec creation is retried within
    /// the budget. Payloads start out typed as mixed until a frame header
    /// says otherwise. When inspection was requested, the exit state is
    /// recorded on `execution` before the returned sequence ends.
    pub async fn exec(
        &self,
        execution: &Execution,
    ) -> Result<PayloadStream<HijackedStreamPayload>> {
        let script_name = match &execution.command {
            Command::Inline(_) => None,
            Command::Script(path) => {
                let file = std::fs::File::open(path).map_err(|source| Error::ScriptOpen {
                    path: path.clone(),
                    source,
                })?;
                self.upload_opened(file, path, SCRIPT_DIR).await?;
                path.file_name().map(|n| n.to_string_lossy().into_owned())
            }
        };

        let config = ExecConfig {
            cmd: Some(execution.argv(script_name.as_deref())),
            env: (!execution.env.is_empty()).then(|| execution.env.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let client = self.client()?;
        let client: &dyn DaemonClient = client.as_ref();
        let id = self.id();

        let exec_id = retry("create exec", self.retry, move || {
            client.create_exec(id, config.clone())
        })
        .await
        .map_err(|e| Error::retried(Operation::CreateExec, e))?;
        execution.set_id(exec_id.clone());

        let raw = client
            .start_exec(&exec_id)
            .await
            .map_err(|e| Error::remote(Operation::StartExec, e))?;

        info!(container = %id.short(), exec = %exec_id.short(), "started exec");

        let finish = {
            let machine = Arc::clone(&self.machine);
            let execution = execution.clone();
            async move {
                if !execution.inspect {
                    return;
                }

                let client = match machine.connect() {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(exec = %exec_id.short(), error = %e, "cannot inspect exec");
                        return;
                    }
                };

                match client.inspect_exec(&exec_id).await {
                    Ok(inspection) => {
                        debug!(exec = %exec_id.short(), exit_code = ?inspection.exit_code, "exec finished");
                        execution.set_inspection(inspection);
                    }
                    Err(e) => warn!(exec = %exec_id.short(), error = %e, "exec inspection failed"),
                }
            }
        };

        Ok(spawn_decoder(raw, StreamType::Mixed, finish))
    }
}

/// Loosely specified execution, as read from configuration or flags.
///
/// Exactly one of `inline` and `script` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutionSpec {
    #[serde(default)]
    pub inline: Option<String>,
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub inspect: bool,
    #[serde(default)]
    pub interpreter: Option<String>,
}

impl TryFrom<ExecutionSpec> for Execution {
    type Error = Error;

    fn try_from(spec: ExecutionSpec) -> Result<Self> {
        let execution = match (spec.inline, spec.script) {
            (Some(cmd), None) => Execution::inline(cmd),
            (None, Some(path)) => Execution::script(path),
            (Some(_), Some(_)) => {
                return Err(Error::InvalidExecution(
                    "inline command and script are mutually exclusive".into(),
                ));
            }
            (None, None) => {
                return Err(Error::InvalidExecution(
                    "either an inline command or a script is required".into(),
                ));
            }
        };

        let mut env: Vec<String> = spec
            .env
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        env.sort();

        let execution = execution.with_env(env);
        let execution = match spec.interpreter {
            Some(interpreter) => execution.with_interpreter(interpreter),
            None => execution,
        };

        Ok(if spec.inspect {
            execution.with_inspect()
        } else {
            execution
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_runs_under_bash() {
        let exec = Execution::inline("echo hi");
        assert_eq!(exec.argv(None), vec!["bash", "-c", "echo hi"]);
    }

    #[test]
    fn script_runs_uploaded_file() {
        let exec = Execution::script("/tmp/build.sh");
        assert_eq!(exec.argv(Some("build.sh")), vec!["sh", "/build.sh"]);

        let exec = exec.with_interpreter("bash");
        assert_eq!(exec.argv(Some("build.sh")), vec!["bash", "/build.sh"]);
    }

    #[test]
    fn clones_share_record() {
        let exec = Execution::inline("true");
        let clone = exec.clone();
        exec.set_id(ExecId::new("abc"));
        assert_eq!(clone.id(), Some(ExecId::new("abc")));
    }
}
