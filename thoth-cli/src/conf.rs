//! External assembler and linker settings.
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable naming a configuration file.
pub const CONF_ENV: &str = "THOTH_TOOLCHAIN";

/// Configuration file looked up next to the source file.
pub const CONF_FILE: &str = "thoth.yaml";

/// Settings for the programs that turn assembly text into an executable.
///
/// Missing fields in the YAML file keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolchainConf {
    pub assembler: String,
    pub assembler_args: Vec<String>,
    pub linker: String,
    pub linker_args: Vec<String>,
    /// Upper bound on each tool's run time.
    pub timeout_secs: u64,
    pub keep_object: bool,
}

impl Default for ToolchainConf {
    fn default() -> Self {
        Self {
            assembler: "nasm".to_owned(),
            assembler_args: vec!["-f".to_owned(), "elf64".to_owned()],
            linker: "ld".to_owned(),
            linker_args: vec![],
            timeout_secs: 10,
            keep_object: false,
        }
    }
}

impl ToolchainConf {
    pub fn from_file(filepath: &Path) -> Result<Self> {
        let file = fs::File::open(filepath)
            .with_context(|| format!("failed to open {}", filepath.display()))?;

        let conf: ToolchainConf = serde_yaml::from_reader(file)
            .with_context(|| format!("invalid toolchain configuration {}", filepath.display()))?;
        log::debug!("loaded toolchain configuration: {:#?}", conf);

        Ok(conf)
    }

    /// Configuration for compiling the given source file.
    pub fn discover(source: &Path) -> Result<Self> {
        match Self::locate(source, env::var_os(CONF_ENV).map(PathBuf::from)) {
            Some(filepath) => Self::from_file(&filepath),
            None => Ok(Self::default()),
        }
    }

    /// The explicit path wins, even when it doesn't exist.
    fn locate(source: &Path, explicit: Option<PathBuf>) -> Option<PathBuf> {
        if explicit.is_some() {
            return explicit;
        }

        let local = source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONF_FILE);
        local.is_file().then_some(local)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
