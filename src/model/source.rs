//! Per-run artifacts shared between enrichers

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Transient data produced and consumed by the steps of one run.
///
/// Never persisted. Steps that need an upstream artifact must treat its
/// absence as "nothing to do" unless that absence is the failure to report.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    /// Absolute path of the photo's backing file
    pub absolute_path: PathBuf,
    /// Decoded original image bytes
    pub original_image: Option<Vec<u8>>,
    /// Downscaled preview used by analysis steps
    pub preview_image: Option<Vec<u8>>,
    pub thumbnail: Option<Vec<u8>>,
    /// Result of the image analysis step
    pub analysis: Option<Value>,
    /// Anything else a step wants to hand downstream
    pub artifacts: HashMap<String, Value>,
}

impl SourceData {
    pub fn new(absolute_path: impl Into<PathBuf>) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            ..Self::default()
        }
    }

    /// Store an artifact under `key`, replacing any previous value.
    pub fn put_artifact(&mut self, key: impl Into<String>, value: Value) {
        self.artifacts.insert(key.into(), value);
    }

    pub fn artifact(&self, key: &str) -> Option<&Value> {
        self.artifacts.get(key)
    }
}
