use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::config::entry_point::public_type_name;
use crate::types::ResourceLimits;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Toolchain descriptor for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ 17 (GCC)")
    pub name: String,

    /// File extension
    pub extension: FileExtension,

    /// How the source file and program name are chosen
    #[serde(default)]
    pub entry_point: EntryPoint,

    /// Program name used when no name is derived from the source
    #[serde(default = "default_stem")]
    pub stem: String,

    /// Compilation configuration (None for interpreted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

/// Rule for naming the submitted source file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryPoint {
    /// Always use the language's `stem`
    #[default]
    Fixed,

    /// Name the file after the first public type declared in the source
    PublicClass,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Program name for the given source (class name for JVM-style languages)
    pub fn program_name(&self, source: &str) -> String {
        match self.entry_point {
            EntryPoint::Fixed => self.stem.clone(),
            EntryPoint::PublicClass => public_type_name(source)
                .map(str::to_owned)
                .unwrap_or_else(|| self.stem.clone()),
        }
    }

    /// Source file name for a program name
    pub fn source_name(&self, program: &str) -> String {
        format!("{program}.{}", self.extension)
    }

    /// Artifact name produced by the compile step
    pub fn output_name(&self) -> &str {
        self.compile
            .as_ref()
            .map(|compile| compile.output_name.as_str())
            .unwrap_or(self.stem.as_str())
    }
}

/// Values substituted into command templates
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Absolute path of the source file
    pub source: PathBuf,
    /// Absolute path of the compile artifact
    pub output: PathBuf,
    /// Program or class name
    pub program: String,
    /// Workspace directory
    pub dir: PathBuf,
}

impl CommandContext {
    pub fn new(dir: &Path, language: &Language, program: &str) -> Self {
        Self {
            source: dir.join(language.source_name(program)),
            output: dir.join(language.output_name()),
            program: program.to_owned(),
            dir: dir.to_path_buf(),
        }
    }

    /// Expand placeholders in the given command
    ///
    /// Placeholders: `{source}`, `{output}`, `{binary}` (same as `{output}`),
    /// `{program}`, `{dir}`. Each template entry stays a single argument.
    pub fn expand(&self, command: &[String]) -> Vec<String> {
        let source = self.source.to_string_lossy();
        let output = self.output.to_string_lossy();
        let dir = self.dir.to_string_lossy();
        command
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source)
                    .replace("{output}", &output)
                    .replace("{binary}", &output)
                    .replace("{program}", &self.program)
                    .replace("{dir}", &dir)
            })
            .collect()
    }
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Program and arguments with placeholders
    pub command: Vec<String>,

    /// Artifact name inside the workspace (e.g., "main")
    #[serde(default = "default_stem")]
    pub output_name: String,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for compilation (overrides defaults)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Program and arguments with placeholders
    pub command: Vec<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for execution (overrides defaults)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,
}

fn default_stem() -> String {
    "main".to_owned()
}
