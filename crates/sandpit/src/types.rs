use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit code reported when the runner killed the process or it died by signal
pub const FORCED_EXIT_CODE: i32 = -1;

/// Per-phase limits applied to a single subprocess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock budget in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Maximum captured bytes per output stream
    #[serde(default)]
    pub output_byte_cap: Option<u64>,

    /// Time between SIGTERM and SIGKILL in milliseconds
    #[serde(default)]
    pub grace_period_ms: Option<u64>,
}

impl ResourceLimits {
    /// 1 kibibyte in bytes
    pub const KIB: u64 = 1024;
    /// 1 mebibyte in bytes
    pub const MIB: u64 = 1024 * 1024;

    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_OUTPUT_BYTE_CAP: u64 = Self::MIB;
    pub const DEFAULT_GRACE_PERIOD_MS: u64 = 1_000;

    /// Create new resource limits populated with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits with every field unset, useful as an override layer
    pub fn unset() -> Self {
        Self {
            timeout_ms: None,
            output_byte_cap: None,
            grace_period_ms: None,
        }
    }

    /// Set the wall clock timeout in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set the output cap in bytes
    pub fn with_output_byte_cap(mut self, bytes: u64) -> Self {
        self.output_byte_cap = Some(bytes);
        self
    }

    /// Set the termination grace period in milliseconds
    pub fn with_grace_period_ms(mut self, ms: u64) -> Self {
        self.grace_period_ms = Some(ms);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            output_byte_cap: overrides.output_byte_cap.or(self.output_byte_cap),
            grace_period_ms: overrides.grace_period_ms.or(self.grace_period_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(Self::DEFAULT_TIMEOUT_MS))
    }

    pub fn output_cap(&self) -> usize {
        let cap = self.output_byte_cap.unwrap_or(Self::DEFAULT_OUTPUT_BYTE_CAP);
        usize::try_from(cap).unwrap_or(usize::MAX)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(
            self.grace_period_ms
                .unwrap_or(Self::DEFAULT_GRACE_PERIOD_MS),
        )
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            timeout_ms: Some(Self::DEFAULT_TIMEOUT_MS),
            output_byte_cap: Some(Self::DEFAULT_OUTPUT_BYTE_CAP),
            grace_period_ms: Some(Self::DEFAULT_GRACE_PERIOD_MS),
        }
    }
}

/// Size bounds checked before a request reaches the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLimits {
    /// Maximum source size in bytes
    #[serde(default = "default_request_bytes")]
    pub max_code_bytes: usize,

    /// Maximum stdin size in bytes
    #[serde(default = "default_request_bytes")]
    pub max_input_bytes: usize,
}

fn default_request_bytes() -> usize {
    1024 * 1024
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_code_bytes: default_request_bytes(),
            max_input_bytes: default_request_bytes(),
        }
    }
}

/// Terminal state of a subprocess
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Program exited with code 0
    Ok,

    /// Program exited with a non-zero code
    RuntimeError,

    /// Program was killed by a signal it did not receive from the runner
    Signaled,

    /// Wall clock budget expired and the runner terminated the process
    TimedOut,

    /// A captured stream exceeded the output cap and the runner terminated the process
    OutputLimitExceeded,
}

impl ExecutionStatus {
    /// Whether the runner terminated the process itself
    #[must_use]
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::TimedOut | ExecutionStatus::OutputLimitExceeded
        )
    }
}

/// Outcome of one subprocess invocation
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub status: ExecutionStatus,

    /// Exit code, or [`FORCED_EXIT_CODE`] when forced or signaled
    pub exit_code: i32,

    /// Signal number if the program died from a signal
    pub signal: Option<i32>,

    /// Captured standard output, at most the output cap
    pub stdout: Vec<u8>,

    /// Captured standard error, at most the output cap
    pub stderr: Vec<u8>,

    /// Wall clock time from spawn to reap
    pub wall_time: Duration,

    /// Human-readable summary of a non-successful outcome
    pub error: Option<String>,
}

impl ProcessResult {
    /// Check if the process exited on its own with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Ok && self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl Default for ProcessResult {
    fn default() -> Self {
        Self {
            status: ExecutionStatus::Ok,
            exit_code: 0,
            signal: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            wall_time: Duration::ZERO,
            error: None,
        }
    }
}

/// A request to run one program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Language id, must key the registry
    pub language: String,

    /// Source text
    pub code: String,

    /// Text fed to the program's standard input
    #[serde(default, rename = "input", skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn stdin_bytes(&self) -> &[u8] {
        self.stdin.as_deref().unwrap_or_default().as_bytes()
    }
}

/// Response returned for every code-related outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub output: String,
    pub stderr: String,
    pub error: Option<String>,

    /// Elapsed milliseconds since the pipeline started
    pub execution_time: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub const COMPILATION_FAILED: &'static str = "Compilation failed";

    /// Build the response for a compile phase that did not succeed
    pub fn compilation_failed(compile: &ProcessResult, elapsed: Duration) -> Self {
        Self {
            output: compile.stdout_lossy(),
            stderr: compile.stderr_lossy(),
            error: Some(Self::COMPILATION_FAILED.to_owned()),
            execution_time: millis(elapsed),
            exit_code: Some(compile.exit_code),
        }
    }

    /// Build the response from the run phase
    pub fn from_run(run: &ProcessResult, elapsed: Duration) -> Self {
        Self {
            output: run.stdout_lossy(),
            stderr: run.stderr_lossy(),
            error: run.error.clone(),
            execution_time: millis(elapsed),
            exit_code: Some(run.exit_code),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
