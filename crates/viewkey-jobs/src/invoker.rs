//! Invocation of the external scanning tool.
//!
//! Two strategies are provided. [`ScriptInvoker`] hands the whole
//! init/sync/enhance/export sequence to an external driver program.
//! [`DevtoolInvoker`] runs the wallet subcommands of `zcash-devtool` itself
//! and writes the `list-tx` output to the report file.
//!
//! Both remove a stale report before running, so a report on disk after a
//! successful exit always belongs to the current run.

use crate::error::{JobError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use viewkey_core::{BirthdayHeight, ToolConfig, ToolMode, ViewingKey};

const REDACTED: &str = "[redacted]";

/// Everything the tool needs for one scan.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Secret key material
    pub key: ViewingKey,
    /// Scan start height
    pub birthday: BirthdayHeight,
    /// Wallet directory for this key
    pub wallet_dir: PathBuf,
    /// Wallet label given to the tool
    pub wallet_name: String,
    /// Report path without the `.txt` extension
    pub output_prefix: PathBuf,
}

impl SyncRequest {
    /// Path of the report the tool writes: the output prefix plus `.txt`.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        let mut path = OsString::from(self.output_prefix.as_os_str());
        path.push(".txt");
        PathBuf::from(path)
    }
}

/// Captured result of running the tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the tool exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr joined by a newline.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    fn from_process(output: &std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Append a step's output; returns whether the step succeeded.
    fn absorb(&mut self, step: ToolOutput) -> bool {
        let ok = step.success();
        self.exit_code = step.exit_code;
        self.stdout.push_str(&step.stdout);
        self.stderr.push_str(&step.stderr);
        ok
    }

    /// Strip occurrences of the key from captured text.
    fn redact(mut self, key: &ViewingKey) -> Self {
        let secret = key.expose();
        if !secret.is_empty() {
            self.stdout = self.stdout.replace(secret, REDACTED);
            self.stderr = self.stderr.replace(secret, REDACTED);
        }
        self
    }
}

/// Runs the scanning tool for one request.
///
/// An `Err` means the tool could not be run at all. A tool that ran and
/// failed is an `Ok` with a non-zero exit code.
#[async_trait]
pub trait SyncInvoker: Send + Sync {
    /// Run the tool to completion.
    async fn invoke(&self, request: &SyncRequest) -> Result<ToolOutput>;

    /// Read the report a successful run left behind.
    ///
    /// `Ok(None)` means no report was written.
    async fn read_report(&self, request: &SyncRequest) -> Result<Option<String>> {
        match tokio::fs::read_to_string(request.report_path()).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Build the invoker the configuration selects.
#[must_use]
pub fn from_config(config: &ToolConfig) -> Arc<dyn SyncInvoker> {
    match config.mode {
        ToolMode::Script => Arc::new(ScriptInvoker::from_config(config)),
        ToolMode::Devtool => Arc::new(DevtoolInvoker::from_config(config)),
    }
}

/// Runs an external driver with `--key --birthday --wallet-dir --name --output-prefix`.
#[derive(Debug, Clone)]
pub struct ScriptInvoker {
    program: String,
    program_args: Vec<String>,
    working_dir: Option<PathBuf>,
    server: Option<String>,
}

impl ScriptInvoker {
    /// Invoker for `program` with no extra arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            working_dir: None,
            server: None,
        }
    }

    /// Invoker described by the tool configuration.
    #[must_use]
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            program: config.program.clone(),
            program_args: config.program_args.clone(),
            working_dir: config.working_dir.clone(),
            server: Some(config.server.clone()),
        }
    }

    /// Arguments placed before the request arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl SyncInvoker for ScriptInvoker {
    async fn invoke(&self, request: &SyncRequest) -> Result<ToolOutput> {
        prepare_paths(request).await?;

        let mut cmd = base_command(&self.program, &self.program_args, self.working_dir.as_deref());
        cmd.arg("--key")
            .arg(request.key.expose())
            .arg("--birthday")
            .arg(request.birthday.to_string())
            .arg("--wallet-dir")
            .arg(&request.wallet_dir)
            .arg("--name")
            .arg(&request.wallet_name)
            .arg("--output-prefix")
            .arg(&request.output_prefix);
        if let Some(server) = &self.server {
            cmd.arg("--server").arg(server);
        }

        tracing::debug!(
            "Running {} for wallet {}",
            self.program,
            request.wallet_dir.display()
        );
        run(&mut cmd, &self.program).await.map(|out| out.redact(&request.key))
    }
}

/// Drives `zcash-devtool wallet` directly: init-fvk, sync, enhance, list-tx.
#[derive(Debug, Clone)]
pub struct DevtoolInvoker {
    program: String,
    program_args: Vec<String>,
    working_dir: Option<PathBuf>,
    server: String,
    disable_tor: bool,
}

impl DevtoolInvoker {
    /// Invoker described by the tool configuration.
    #[must_use]
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            program: config.program.clone(),
            program_args: config.program_args.clone(),
            working_dir: config.working_dir.clone(),
            server: config.server.clone(),
            disable_tor: config.disable_tor,
        }
    }

    fn wallet_command(&self, wallet_dir: &Path, subcommand: &str) -> Command {
        let mut cmd = base_command(&self.program, &self.program_args, self.working_dir.as_deref());
        cmd.arg("wallet").arg("-w").arg(wallet_dir).arg(subcommand);
        cmd
    }

    async fn step(&self, name: &str, mut cmd: Command, key: &ViewingKey) -> Result<ToolOutput> {
        tracing::debug!("zcash-devtool step: {}", name);
        let output = run(&mut cmd, &self.program).await?.redact(key);
        if !output.success() {
            tracing::warn!(
                "zcash-devtool {} exited with {:?}",
                name,
                output.exit_code
            );
        }
        Ok(output)
    }
}

#[async_trait]
impl SyncInvoker for DevtoolInvoker {
    async fn invoke(&self, request: &SyncRequest) -> Result<ToolOutput> {
        prepare_paths(request).await?;
        let wallet_dir = request.wallet_dir.as_path();
        let mut transcript = ToolOutput::default();

        if tokio::fs::try_exists(wallet_dir).await? {
            tracing::debug!("Wallet {} exists, skipping init", wallet_dir.display());
        } else {
            let mut cmd = self.wallet_command(wallet_dir, "init-fvk");
            cmd.arg("--name")
                .arg(&request.wallet_name)
                .arg("--fvk")
                .arg(request.key.expose())
                .arg("--birthday")
                .arg(request.birthday.to_string())
                .arg("-s")
                .arg(&self.server);
            if self.disable_tor {
                cmd.arg("--disable-tor");
            }
            let out = self.step("init-fvk", cmd, &request.key).await?;
            if !transcript.absorb(out) {
                return Ok(transcript);
            }
        }

        let mut sync = self.wallet_command(wallet_dir, "sync");
        sync.arg("-s").arg(&self.server);
        let out = self.step("sync", sync, &request.key).await?;
        if !transcript.absorb(out) {
            return Ok(transcript);
        }

        let mut enhance = self.wallet_command(wallet_dir, "enhance");
        enhance.arg("-s").arg(&self.server);
        if self.disable_tor {
            enhance.arg("--disable-tor");
        }
        let out = self.step("enhance", enhance, &request.key).await?;
        if !transcript.absorb(out) {
            return Ok(transcript);
        }

        let list = self.wallet_command(wallet_dir, "list-tx");
        let out = self.step("list-tx", list, &request.key).await?;
        if out.success() {
            tokio::fs::write(request.report_path(), &out.stdout).await?;
            transcript.exit_code = out.exit_code;
            transcript.stderr.push_str(&out.stderr);
        } else {
            transcript.absorb(out);
        }
        Ok(transcript)
    }
}

fn base_command(program: &str, args: &[String], working_dir: Option<&Path>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }
    cmd
}

async fn run(cmd: &mut Command, program: &str) -> Result<ToolOutput> {
    let output = cmd
        .output()
        .await
        .map_err(|e| JobError::Invoker(format!("failed to start {program}: {e}")))?;
    Ok(ToolOutput::from_process(&output))
}

/// Create parent directories and remove a stale report.
async fn prepare_paths(request: &SyncRequest) -> Result<()> {
    for path in [request.wallet_dir.as_path(), request.output_prefix.as_path()] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    match tokio::fs::remove_file(request.report_path()).await {
        Ok(()) => tracing::debug!("Removed stale report {}", request.report_path().display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
