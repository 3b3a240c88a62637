use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::engine::{
    Artifact, EngineAssets, EngineEvent, EngineEventKind, EngineJob, EngineStats, GeometryEngine,
};
use crate::foundation::core::RequestId;
use crate::foundation::error::{ParamcadError, ParamcadResult};
use crate::schema::value::ParamSnapshot;

/// Program used when neither the constructor nor [`EngineAssets::program`] names one.
pub const DEFAULT_ENGINE_PROGRAM: &str = "openscad";

const INPUT_FILE: &str = "input.scad";
const LIBRARY_PATH_VAR: &str = "OPENSCADPATH";

/// Runs the engine as one subprocess per job.
///
/// Each job gets a scratch directory holding the source and its auxiliary files. Parameters are
/// passed as `-D id=literal` overrides and the artifact is read back from the output path.
#[derive(Debug)]
pub struct CommandEngine {
    program: PathBuf,
    library_paths: Vec<PathBuf>,
    format: String,
    running: HashMap<RequestId, oneshot::Sender<()>>,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_PROGRAM)
    }
}

impl CommandEngine {
    /// Engine backed by `program`, producing STL.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            library_paths: Vec::new(),
            format: "stl".to_owned(),
            running: HashMap::new(),
        }
    }

    /// Output file extension handed to the engine (`stl`, `3mf`, `off`, ...).
    pub fn with_output_format(mut self, extension: impl Into<String>) -> Self {
        self.format = extension.into().trim_start_matches('.').to_owned();
        self
    }

    /// Program this engine runs.
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl GeometryEngine for CommandEngine {
    async fn initialize(&mut self, assets: EngineAssets) -> ParamcadResult<()> {
        if let Some(program) = assets.program {
            self.program = program;
        }
        for dir in &assets.library_paths {
            if !dir.is_dir() {
                tracing::warn!(path = %dir.display(), "library path is not a directory");
            }
        }
        self.library_paths = assets.library_paths;

        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                ParamcadError::engine(format!(
                    "failed to run '{}' (is it installed and on PATH?): {e}",
                    self.program.display()
                ))
            })?;
        if !status.success() {
            return Err(ParamcadError::engine(format!(
                "'{} --version' exited with {status}",
                self.program.display()
            )));
        }
        tracing::debug!(program = %self.program.display(), "engine program is runnable");
        Ok(())
    }

    fn submit(&mut self, job: EngineJob, events: mpsc::UnboundedSender<EngineEvent>) {
        self.running.retain(|_, kill| !kill.is_closed());
        let (kill_tx, kill_rx) = oneshot::channel();
        self.running.insert(job.request_id, kill_tx);

        let run = JobRun {
            program: self.program.clone(),
            library_paths: self.library_paths.clone(),
            format: self.format.clone(),
        };
        tokio::spawn(async move {
            let request_id = job.request_id;
            let kind = match run.execute(&job, &events, kill_rx).await {
                Ok((artifact, stats)) => EngineEventKind::Complete { artifact, stats },
                Err(JobError { kind, message }) => {
                    tracing::debug!(request = %request_id, kind, %message, "engine job failed");
                    EngineEventKind::Error {
                        kind: kind.to_owned(),
                        message,
                    }
                }
            };
            let _ = events.send(EngineEvent { request_id, kind });
        });
    }

    fn cancel(&mut self, request_id: RequestId) {
        if let Some(kill) = self.running.remove(&request_id) {
            let _ = kill.send(());
        }
    }
}

#[derive(Debug)]
struct JobError {
    kind: &'static str,
    message: String,
}

impl JobError {
    fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

struct JobRun {
    program: PathBuf,
    library_paths: Vec<PathBuf>,
    format: String,
}

impl JobRun {
    async fn execute(
        &self,
        job: &EngineJob,
        events: &mpsc::UnboundedSender<EngineEvent>,
        kill: oneshot::Receiver<()>,
    ) -> Result<(Artifact, EngineStats), JobError> {
        let dir = scratch_dir(job.request_id);
        let result = self.run_in(&dir, job, events, kill).await;
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::debug!(path = %dir.display(), error = %e, "failed to remove scratch directory");
        }
        result
    }

    async fn run_in(
        &self,
        dir: &Path,
        job: &EngineJob,
        events: &mpsc::UnboundedSender<EngineEvent>,
        kill: oneshot::Receiver<()>,
    ) -> Result<(Artifact, EngineStats), JobError> {
        let io = |what: &str, path: &Path, e: std::io::Error| {
            JobError::new("io", format!("failed to {what} '{}': {e}", path.display()))
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io("create scratch directory", dir, e))?;
        let input = dir.join(INPUT_FILE);
        tokio::fs::write(&input, job.source.as_bytes())
            .await
            .map_err(|e| io("write", &input, e))?;
        for (name, bytes) in job.auxiliary_files.iter() {
            let rel = relative_path(name).ok_or_else(|| {
                JobError::new("io", format!("auxiliary file path escapes the job: {name}"))
            })?;
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io("create directory", parent, e))?;
            }
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|e| io("write", &path, e))?;
        }

        let output = dir.join(format!("output.{}", self.format));
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .args(build_args(&job.parameters, &output, &input))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if !self.library_paths.is_empty()
            && let Ok(joined) = std::env::join_paths(&self.library_paths)
        {
            cmd.env(LIBRARY_PATH_VAR, joined);
        }

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| {
            JobError::new(
                "spawn",
                format!("failed to spawn '{}': {e}", self.program.display()),
            )
        })?;
        tracing::debug!(request = %job.request_id, tier = %job.tier, "engine process started");
        let _ = events.send(EngineEvent {
            request_id: job.request_id,
            kind: EngineEventKind::Progress(0),
        });

        // Dropping the wait future drops the child, which kills it.
        let finished = tokio::select! {
            out = child.wait_with_output() => out.map_err(|e| {
                JobError::new("io", format!("failed to wait for the engine: {e}"))
            })?,
            Ok(()) = kill => return Err(JobError::new("cancelled", "killed on request")),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let stderr = String::from_utf8_lossy(&finished.stderr);
        if !finished.status.success() {
            return Err(JobError::new(
                "exit",
                format!("engine exited with {}: {}", finished.status, stderr_tail(&stderr)),
            ));
        }
        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| io("read engine output", &output, e))?;
        if bytes.is_empty() {
            return Err(JobError::new("empty", "engine produced an empty artifact"));
        }

        let stats = EngineStats {
            elapsed_ms,
            artifact_bytes: bytes.len() as u64,
            warnings: warnings(&stderr),
        };
        Ok((Artifact::from(bytes), stats))
    }
}

/// `-o <output> -D id=literal ... <input>` in a stable parameter order.
fn build_args(parameters: &ParamSnapshot, output: &Path, input: &Path) -> Vec<OsString> {
    let mut args = Vec::with_capacity(parameters.len() * 2 + 3);
    args.push(OsString::from("-o"));
    args.push(output.as_os_str().to_owned());
    for (id, value) in parameters {
        args.push(OsString::from("-D"));
        args.push(OsString::from(format!("{id}={}", value.to_literal())));
    }
    args.push(input.as_os_str().to_owned());
    args
}

/// Accept only plain relative paths; `..`, roots and prefixes are rejected.
fn relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

fn scratch_dir(id: RequestId) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!(
        "paramcad-{}-{nanos}-{}",
        std::process::id(),
        id.0
    ))
}

fn warnings(stderr: &str) -> Vec<String> {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("WARNING") || l.starts_with("DEPRECATED"))
        .map(str::to_owned)
        .collect()
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "(no output)".to_owned()
    } else {
        tail
    }
}
