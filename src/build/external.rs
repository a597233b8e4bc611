//! External command line tools run over built files.
//!
//! Processors turn a source format into the published one (`.scss` into
//! `.css`) on every build. Optimizers shrink static files and pages of
//! deploy builds. Both read the file on stdin and write the result to
//! stdout.

use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

use crate::config::{ExternalConfig, ExternalsConfig};

#[derive(thiserror::Error, Debug)]
pub enum ExternalError {
    #[error("external '{name}' has no command")]
    EmptyCommand { name: String },

    #[error("failed to run external '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("external '{name}' exited with {status}: {stderr}")]
    Failed {
        name: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// A tool that transforms file contents.
pub trait External: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the tool runs on files with this extension.
    fn accepts(&self, extension: &str) -> bool;

    /// Extension of the transformed file, if it differs from the input's.
    fn output_extension(&self) -> Option<&str> {
        None
    }

    fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, ExternalError>;
}

/// A configured program fed through stdin and stdout.
pub struct CommandExternal {
    config: ExternalConfig,
}

impl CommandExternal {
    pub fn new(config: ExternalConfig) -> Self {
        Self { config }
    }

    fn spawn_error(&self, source: std::io::Error) -> ExternalError {
        ExternalError::Spawn {
            name: self.config.name.clone(),
            source,
        }
    }
}

impl External for CommandExternal {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn accepts(&self, extension: &str) -> bool {
        self.config
            .extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    fn output_extension(&self) -> Option<&str> {
        self.config.output_extension.as_deref()
    }

    fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, ExternalError> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| ExternalError::EmptyCommand {
                name: self.config.name.clone(),
            })?;

        debug!(external = %self.config.name, program, bytes = input.len(), "running external");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.spawn_error(std::io::Error::other("failed to capture stdin")))?;
        // Written from a thread: the tool may fill stdout before reading all input.
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output().map_err(|e| self.spawn_error(e))?;
        if let Ok(Err(e)) = writer.join()
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(self.spawn_error(e));
        }

        if !output.status.success() {
            return Err(ExternalError::Failed {
                name: self.config.name.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// The processors and optimizers of a site.
#[derive(Default)]
pub struct ExternalManager {
    processors: Vec<Box<dyn External>>,
    optimizers: Vec<Box<dyn External>>,
}

impl ExternalManager {
    pub fn from_config(config: &ExternalsConfig) -> Self {
        let commands = |list: &[ExternalConfig]| {
            list.iter()
                .cloned()
                .map(|c| Box::new(CommandExternal::new(c)) as Box<dyn External>)
                .collect()
        };
        Self {
            processors: commands(&config.processors),
            optimizers: commands(&config.optimizers),
        }
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn optimizer_names(&self) -> Vec<&str> {
        self.optimizers.iter().map(|o| o.name()).collect()
    }

    /// Extension a file with `extension` is published with once processed.
    pub fn processed_extension(&self, extension: &str) -> Option<&str> {
        self.processors
            .iter()
            .rev()
            .filter(|p| p.accepts(extension))
            .find_map(|p| p.output_extension())
    }

    pub fn processes(&self, extension: &str) -> bool {
        self.processors.iter().any(|p| p.accepts(extension))
    }

    pub fn optimizes(&self, extension: &str) -> bool {
        self.optimizers.iter().any(|o| o.accepts(extension))
    }

    /// Run every processor accepting `extension` over `bytes`, in order.
    pub fn process(&self, extension: &str, bytes: Vec<u8>) -> Result<Vec<u8>, ExternalError> {
        run_all(&self.processors, extension, bytes)
    }

    /// Run every optimizer accepting `extension` over `bytes`, in order.
    pub fn optimize(&self, extension: &str, bytes: Vec<u8>) -> Result<Vec<u8>, ExternalError> {
        run_all(&self.optimizers, extension, bytes)
    }
}

fn run_all(externals: &[Box<dyn External>], extension: &str, bytes: Vec<u8>) -> Result<Vec<u8>, ExternalError> {
    externals
        .iter()
        .filter(|e| e.accepts(extension))
        .try_fold(bytes, |bytes, external| external.run(bytes))
}
