//! Command builder for a single subprocess invocation

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::process::ProcessError;
use crate::types::ResourceLimits;

/// Fallback search path when the host environment has no PATH
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Builder for one program invocation
///
/// The program is executed directly with an argument list; no shell is involved.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    stdin: Vec<u8>,
    env: HashMap<String, String>,
    timeout: Duration,
    output_cap: usize,
    grace_period: Duration,
}

impl ProcessCommand {
    /// Create a builder for `program` with default limits
    pub fn new(program: impl Into<String>) -> Self {
        let limits = ResourceLimits::default();
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stdin: Vec::new(),
            env: HashMap::new(),
            timeout: limits.timeout(),
            output_cap: limits.output_cap(),
            grace_period: limits.grace_period(),
        }
    }

    /// Build from an expanded argument vector whose first entry is the program
    pub fn from_argv(argv: Vec<String>) -> Result<Self, ProcessError> {
        let mut argv = argv.into_iter();
        let program = argv.next().ok_or(ProcessError::EmptyCommand)?;
        Ok(Self::new(program).args(argv))
    }

    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory (also used as HOME and TMPDIR)
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the bytes written to standard input
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = data.into();
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set multiple environment variables
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the wall clock timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-stream output cap in bytes
    pub fn output_cap(mut self, bytes: usize) -> Self {
        self.output_cap = bytes;
        self
    }

    /// Set the delay between SIGTERM and SIGKILL
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Apply timeout, output cap and grace period from resource limits
    pub fn limits(self, limits: &ResourceLimits) -> Self {
        self.timeout(limits.timeout())
            .output_cap(limits.output_cap())
            .grace_period(limits.grace_period())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_output_cap(&self) -> usize {
        self.output_cap
    }

    pub fn get_grace_period(&self) -> Duration {
        self.grace_period
    }

    pub(crate) fn stdin_data(&self) -> &[u8] {
        &self.stdin
    }

    pub(crate) fn get_working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Environment passed to the child
    ///
    /// Starts empty, inherits PATH, points HOME and TMPDIR at the working
    /// directory, then applies explicit variables.
    pub fn environment(&self) -> Vec<(OsString, OsString)> {
        let path = std::env::var_os("PATH").unwrap_or_else(|| OsString::from(DEFAULT_PATH));
        let mut vars = vec![(OsString::from("PATH"), path)];

        if let Some(ref dir) = self.working_dir {
            vars.push((OsString::from("HOME"), dir.clone().into_os_string()));
            vars.push((OsString::from("TMPDIR"), dir.clone().into_os_string()));
        }

        let mut explicit: Vec<_> = self.env.iter().collect();
        explicit.sort();
        for (key, value) in explicit {
            vars.retain(|(k, _)| k.as_os_str() != key.as_str());
            vars.push((OsString::from(key), OsString::from(value)));
        }

        vars
    }
}
