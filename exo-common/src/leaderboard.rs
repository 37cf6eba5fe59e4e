//! Model leaderboard from a precomputed metrics file
//!
//! `metrics.json` maps a model id to either a bare accuracy or an object of
//! metrics. The file is display-only: a missing or broken file yields an
//! empty, unavailable leaderboard rather than an error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Placeholder shown for absent metrics
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MetricsEntry {
    Accuracy(f64),
    Detailed(ModelMetrics),
}

/// Metrics recorded for one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub roc_auc: Option<f64>,
}

/// Leaderboard row with display strings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub model: String,
    pub metrics: ModelMetrics,
    pub accuracy_display: String,
}

/// Ranked leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub available: bool,
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            entries: Vec::new(),
        }
    }

    /// Parse and rank; models without accuracy sort last, ties by name
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, MetricsEntry> = serde_json::from_str(text)?;

        let mut rows: Vec<(String, ModelMetrics)> = raw
            .into_iter()
            .map(|(model, entry)| {
                let metrics = match entry {
                    MetricsEntry::Accuracy(accuracy) => ModelMetrics {
                        accuracy: Some(accuracy),
                        ..Default::default()
                    },
                    MetricsEntry::Detailed(metrics) => metrics,
                };
                (model, metrics)
            })
            .collect();

        rows.sort_by(|(name_a, a), (name_b, b)| {
            let acc_a = a.accuracy.filter(|v| v.is_finite());
            let acc_b = b.accuracy.filter(|v| v.is_finite());
            match (acc_a, acc_b) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| name_a.cmp(name_b))
        });

        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(i, (model, metrics))| LeaderboardEntry {
                rank: i + 1,
                accuracy_display: format_metric(metrics.accuracy),
                model,
                metrics,
            })
            .collect();

        Ok(Self {
            available: true,
            entries,
        })
    }

    /// Load from disk, degrading to [`Leaderboard::unavailable`]
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Metrics file {} not readable: {}", path.display(), e);
                return Self::unavailable();
            }
        };
        match Self::from_json(&text) {
            Ok(board) => board,
            Err(e) => {
                warn!("Metrics file {} not parseable: {}", path.display(), e);
                Self::unavailable()
            }
        }
    }
}

/// Percentage with one decimal, or "N/A"
pub fn format_metric(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}
