//! Feature manifest and feature-vector resolution
//!
//! The manifest is the ordered list of column names the classifier was
//! trained on. It is loaded once at startup; every prediction request resolves
//! its named inputs through it, so manual forms, CSV uploads and the model all
//! agree on order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::{Error, Result};

/// On-disk manifest: a bare array or an object with `feat_list`
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    List(Vec<String>),
    Meta { feat_list: Vec<String> },
}

/// Ordered, de-duplicated feature names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureManifest {
    names: Vec<String>,
}

impl FeatureManifest {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::Config("Feature manifest is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for name in &names {
            if name.trim().is_empty() {
                return Err(Error::Config("Feature manifest contains a blank name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!(
                    "Feature manifest lists '{}' more than once",
                    name
                )));
            }
        }
        Ok(Self { names })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let names = match serde_json::from_str::<ManifestFile>(text)? {
            ManifestFile::List(names) => names,
            ManifestFile::Meta { feat_list } => feat_list,
        };
        Self::new(names)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read feature manifest {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Build an ordered vector from named inputs
    ///
    /// Absent names, `None`, NaN and infinities become `missing_default`; the
    /// substituted names are recorded on the vector. Names not in the manifest
    /// are ignored.
    pub fn resolve(
        &self,
        inputs: &HashMap<String, Option<f64>>,
        missing_default: f64,
    ) -> FeatureVector {
        let mut values = Vec::with_capacity(self.names.len());
        let mut substituted = Vec::new();

        for name in &self.names {
            match inputs.get(name).copied().flatten() {
                Some(v) if v.is_finite() => values.push(v),
                _ => {
                    values.push(missing_default);
                    substituted.push(name.clone());
                }
            }
        }

        FeatureVector {
            values,
            substituted,
        }
    }

    /// Build a vector from cells already laid out in manifest order
    pub fn resolve_ordered(&self, cells: &[Option<f64>], missing_default: f64) -> FeatureVector {
        let mut values = Vec::with_capacity(self.names.len());
        let mut substituted = Vec::new();

        for (i, name) in self.names.iter().enumerate() {
            match cells.get(i).copied().flatten() {
                Some(v) if v.is_finite() => values.push(v),
                _ => {
                    values.push(missing_default);
                    substituted.push(name.clone());
                }
            }
        }

        FeatureVector {
            values,
            substituted,
        }
    }
}

/// Feature values in manifest order
///
/// Built once per prediction and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    substituted: Vec<String>,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Names whose value was replaced by the default
    pub fn substituted(&self) -> &[String] {
        &self.substituted
    }

    pub fn has_substitutions(&self) -> bool {
        !self.substituted.is_empty()
    }
}
