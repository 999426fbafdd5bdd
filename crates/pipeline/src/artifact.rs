//! On-disk JSON artifacts.
//!
//! Every pipeline stage communicates through named JSON files in one output
//! directory. Optional inputs are common (a locale that was never exported, a
//! translation map that was never fetched), so loading is expressed as
//! `try_load -> Option`: a missing artifact is `Ok(None)` and the caller
//! decides to skip, while an artifact that exists but cannot be read or
//! parsed is an error. Enrichment inputs go through `load_optional`, which
//! also skips (with a warning) an artifact that does not parse.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors reading or writing artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact exists but is not the expected JSON.
    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A line of a JSONL stream failed to decode.
    #[error("Malformed record at {path}:{line}: {source}")]
    MalformedLine {
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Fetching a remote stream failed.
    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    /// The result location is not a valid URL.
    #[error("Invalid download URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Named JSON artifact storage.
pub trait ArtifactStore {
    /// Load an artifact; `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact exists but cannot be read or parsed.
    fn try_load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArtifactError>;

    /// Load an optional input; unparseable content counts as absent.
    ///
    /// # Errors
    ///
    /// Returns an error only if the artifact exists but cannot be read.
    fn load_optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArtifactError> {
        match self.try_load(name) {
            Err(ArtifactError::Parse { path, source }) => {
                warn!(path = %path.display(), error = %source, "Skipping unparseable artifact");
                Ok(None)
            }
            other => other,
        }
    }

    /// Write an artifact (pretty-printed), replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be serialized or written.
    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, ArtifactError>;
}

/// Artifacts as files in a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a named artifact.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactError::Io` if the directory cannot be created.
    pub fn ensure_dir(&self) -> Result<(), ArtifactError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ArtifactError::io(&self.dir, e))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn try_load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArtifactError> {
        let path = self.path(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(artifact = %name, "Artifact not present");
                return Ok(None);
            }
            Err(e) => return Err(ArtifactError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ArtifactError::Parse { path, source })
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, ArtifactError> {
        self.ensure_dir()?;
        let path = self.path(name);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Parse {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, bytes).map_err(|e| ArtifactError::io(&path, e))?;
        Ok(path)
    }
}

/// Artifacts held in memory as JSON values.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RefCell<BTreeMap<String, serde_json::Value>>,
}

impl MemoryArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw JSON artifact.
    pub fn insert(&self, name: impl Into<String>, value: serde_json::Value) {
        self.artifacts.borrow_mut().insert(name.into(), value);
    }

    /// Raw JSON of an artifact, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.artifacts.borrow().get(name).cloned()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn try_load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArtifactError> {
        self.get(name)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| ArtifactError::Parse {
                    path: PathBuf::from(name),
                    source,
                })
            })
            .transpose()
    }

    fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, ArtifactError> {
        let value = serde_json::to_value(value).map_err(|source| ArtifactError::Parse {
            path: PathBuf::from(name),
            source,
        })?;
        self.insert(name, value);
        Ok(PathBuf::from(name))
    }
}

/// An artifact found by probing candidate names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// The candidate that existed.
    pub name: String,
    pub value: T,
}

/// Ordered candidate names for one logical artifact.
///
/// Export runs have used different naming conventions over time (for example
/// `zh-TW`, `zhTW` and `tw` suffixes). The first candidate that exists and
/// parses wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNames(Vec<String>);

impl CandidateNames {
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Load the first candidate that exists and parses.
    ///
    /// # Errors
    ///
    /// Returns an error if a candidate exists but cannot be read.
    pub fn resolve<S, T>(&self, store: &S) -> Result<Option<Resolved<T>>, ArtifactError>
    where
        S: ArtifactStore,
        T: DeserializeOwned,
    {
        for name in &self.0 {
            if let Some(value) = store.load_optional(name)? {
                return Ok(Some(Resolved {
                    name: name.clone(),
                    value,
                }));
            }
        }
        Ok(None)
    }
}

impl From<&[&str]> for CandidateNames {
    fn from(names: &[&str]) -> Self {
        Self::new(names.iter().copied())
    }
}
