//! # ExoVision Common Library
//!
//! Domain logic shared by the ExoVision service:
//! - Synthetic transit and decoy light curves
//! - "Planet or not?" round controller
//! - Feature manifest and classification facade
//! - CSV batch scoring
//! - Leaderboard loading
//! - Configuration loading and SSE helpers

pub mod batch;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod game;
pub mod leaderboard;
pub mod sse;
pub mod synth;

pub use classifier::{ClassificationFacade, Classifier, Label, PredictionResult};
pub use error::{Error, Result};
pub use features::{FeatureManifest, FeatureVector};
pub use synth::{SignalCurve, TransitParameters};
