//! Loads workflow documents from a capability-scoped directory.
//!
//! A document is a TOML file with a `name`, a `version` and an ordered
//! `[[stages]]` array:
//!
//! ```toml
//! name = "standard"
//! version = 2
//!
//! [[stages]]
//! key = "todo"
//! label = "To do"
//!
//! [[stages]]
//! key = "done"
//! label = "Done"
//! kind = "merged"
//! terminal = true
//! ```

use crate::workflow::{
    domain::{StageDefinition, WorkflowDef, WorkflowName, WorkflowValidationError, WorkflowVersion},
    services::WorkflowRegistry,
};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const DOCUMENT_EXTENSION: &str = ".toml";

/// A parsed workflow document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow name.
    pub name: WorkflowName,
    /// Workflow version.
    pub version: WorkflowVersion,
    /// Ordered stage declarations.
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

impl WorkflowDocument {
    /// Parses a document from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] when the text is not a valid document.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Errors raised while loading workflow documents.
#[derive(Debug, Error)]
pub enum WorkflowLoadError {
    /// The directory or a document could not be read.
    #[error("failed to read workflow document '{file}': {source}")]
    Io {
        /// File or directory being read.
        file: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A document is not valid TOML or does not match the document shape.
    #[error("failed to parse workflow document '{file}': {source}")]
    Parse {
        /// Offending file.
        file: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// A document parsed but failed workflow validation.
    #[error("invalid workflow document '{file}': {source}")]
    Validation {
        /// Offending file.
        file: String,
        /// Validation failure.
        source: WorkflowValidationError,
    },
}

/// Registers every workflow document found in a directory.
#[derive(Debug, Clone)]
pub struct WorkflowLoader {
    registry: WorkflowRegistry,
}

impl WorkflowLoader {
    /// Creates a loader that registers into `registry`.
    #[must_use]
    pub const fn new(registry: WorkflowRegistry) -> Self {
        Self { registry }
    }

    /// Opens `path` with ambient authority and loads its documents.
    ///
    /// # Errors
    ///
    /// See [`WorkflowLoader::load_dir`].
    pub fn load_path(&self, path: &Utf8Path) -> Result<Vec<Arc<WorkflowDef>>, WorkflowLoadError> {
        let dir = Dir::open_ambient_dir(path, ambient_authority()).map_err(|source| {
            WorkflowLoadError::Io {
                file: path.to_string(),
                source,
            }
        })?;
        self.load_dir(&dir)
    }

    /// Parses every `*.toml` document in `dir` and registers them in
    /// ascending (name, version) order.
    ///
    /// Documents that are already registered with an identical digest are
    /// accepted unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowLoadError`] for the first unreadable, unparsable or
    /// invalid document. Documents applied before the failure stay
    /// registered.
    pub fn load_dir(&self, dir: &Dir) -> Result<Vec<Arc<WorkflowDef>>, WorkflowLoadError> {
        let mut documents = Vec::new();
        for file in document_names(dir)? {
            let contents = dir
                .read_to_string(&file)
                .map_err(|source| WorkflowLoadError::Io {
                    file: file.clone(),
                    source,
                })?;
            let document = WorkflowDocument::parse(&contents).map_err(|source| {
                WorkflowLoadError::Parse {
                    file: file.clone(),
                    source,
                }
            })?;
            documents.push((file, document));
        }
        documents.sort_by(|(_, left), (_, right)| {
            (&left.name, left.version).cmp(&(&right.name, right.version))
        });

        let mut loaded = Vec::with_capacity(documents.len());
        for (file, document) in documents {
            debug!(
                file = %file,
                workflow = %document.name,
                version = %document.version,
                "applying workflow document"
            );
            let workflow = self
                .registry
                .ensure_registered(document.name, document.version, &document.stages)
                .map_err(|source| WorkflowLoadError::Validation { file, source })?;
            loaded.push(workflow);
        }
        Ok(loaded)
    }
}

fn document_names(dir: &Dir) -> Result<Vec<String>, WorkflowLoadError> {
    let io_error = |source| WorkflowLoadError::Io {
        file: ".".to_owned(),
        source,
    };
    let mut names = Vec::new();
    for item in dir.entries().map_err(io_error)? {
        let entry = item.map_err(io_error)?;
        if !entry.file_type().map_err(io_error)?.is_file() {
            continue;
        }
        let name = entry.file_name().map_err(io_error)?;
        if name.ends_with(DOCUMENT_EXTENSION) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
