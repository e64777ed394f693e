//! Reader configuration.

use crate::{Error, Result};
use flimsdt_sdt::ParserConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Options for [`crate::SdtFileReader`].
///
/// Missing JSON fields take their defaults, so a partial file such as
/// `{"merge_intensity": true}` is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Sum each pixel's histogram into one intensity sample.
    pub merge_intensity: bool,
    /// Keep the last decoded chained-per-pixel plane for cropped re-reads.
    pub cache_full_planes: bool,
    /// Header parser options.
    pub parser: ParserConfig,
}

impl ReaderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_merge_intensity(mut self, merge: bool) -> Self {
        self.merge_intensity = merge;
        self
    }

    #[must_use]
    pub fn with_cache_full_planes(mut self, cache: bool) -> Self {
        self.cache_full_planes = cache;
        self
    }

    #[must_use]
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    /// Loads a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened and
    /// [`Error::Config`] if its contents are invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::Config(format!("{}: {e}", path.as_ref().display()))
        })
    }
}
