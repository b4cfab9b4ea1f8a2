//! External delegate process.
//!
//! Spawns the configured program with the prompt (and optionally a context
//! file) as arguments and returns its stdout. A program missing from PATH
//! yields a mock reply rather than an error.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use linewire_core::DelegateSettings;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::DelegateError;

/// Text returned by one delegate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateReply {
    pub text: String,
    /// True when the program was not installed and `text` is a placeholder.
    pub mock: bool,
}

#[derive(Debug, Clone)]
pub struct DelegateInvoker {
    program: String,
    args: Vec<String>,
    prompt_flag: Option<String>,
    context_flag: Option<String>,
    timeout: Duration,
}

impl DelegateInvoker {
    pub fn new(settings: &DelegateSettings) -> Self {
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            prompt_flag: settings.prompt_flag().map(str::to_string),
            context_flag: settings.context_flag().map(str::to_string),
            timeout: settings.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument vector for one run: fixed args, then the context file (when
    /// a flag is configured), then the prompt.
    pub fn build_args(&self, prompt: &str, context_file: Option<&Path>) -> Vec<String> {
        let mut argv = self.args.clone();
        if let (Some(flag), Some(path)) = (&self.context_flag, context_file) {
            argv.push(flag.clone());
            argv.push(path.display().to_string());
        }
        if let Some(flag) = &self.prompt_flag {
            argv.push(flag.clone());
        }
        argv.push(prompt.to_string());
        argv
    }

    /// Run the delegate once and wait for it, up to the configured timeout.
    pub async fn invoke(
        &self,
        prompt: &str,
        context_file: Option<&Path>,
    ) -> Result<DelegateReply, DelegateError> {
        let context_file = match context_file {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => Some(path),
            Some(path) => {
                debug!(path = %path.display(), "Context file missing, invoking without it");
                None
            }
            None => None,
        };
        let argv = self.build_args(prompt, context_file);
        debug!(
            program = %self.program,
            args = argv.len(),
            with_context = context_file.is_some(),
            timeout_secs = self.timeout.as_secs(),
            "Invoking delegate"
        );

        let child = match Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(program = %self.program, "Delegate not installed, returning mock response");
                return Ok(self.mock_reply(prompt));
            }
            Err(source) => {
                return Err(DelegateError::Spawn {
                    program: self.program.clone(),
                    source,
                })
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    program = %self.program,
                    timeout_secs = self.timeout.as_secs(),
                    "Delegate timed out"
                );
                return Err(DelegateError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(code, "Delegate returned non-zero exit code");
            return Err(DelegateError::Failed { code, stderr });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok(DelegateReply { text, mock: false })
    }

    fn mock_reply(&self, prompt: &str) -> DelegateReply {
        DelegateReply {
            text: format!(
                "[Mock {program} Response]\nPrompt: {prompt}\nNote: Install {program} for real responses",
                program = self.program
            ),
            mock: true,
        }
    }
}
