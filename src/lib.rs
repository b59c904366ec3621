//! `autovot`: automatic measurement of voice onset time (VOT) on Praat TextGrids.
//!
//! This crate provides:
//! - A TextGrid model and codec for Praat's long text format
//! - Window derivation: which stretches of audio the classifier should look at
//! - Reintegration: turning classifier predictions into a new TextGrid tier
//! - Pipelines around a pluggable classifier (the AutoVOT programs by default)
//! - Pluggable prediction reports (CSV, JSON)
//!
//! The acoustic work itself (feature extraction, training, decoding) is done by external
//! programs; this crate prepares their inputs and interprets their outputs.

mod error;
pub use error::{Error, Result};

// High-level API (most consumers should start here).
pub mod autovot;
pub mod opts;

// Annotation model and codec.
pub mod textgrid;

// Inputs and the files exchanged with the classifier.
pub mod inputs;
pub mod instance;
pub mod prediction;
pub mod training;
pub mod wav;

// The two engines.
pub mod reintegrate;
pub mod windows;

// Classifier interface and the external-program implementation.
pub mod classifier;

pub mod performance;
pub mod problems;

// Output selection and encoder interfaces.
pub mod output_type;
pub mod vot_encoder;

// Output encoders that serialize predictions into various formats.
pub mod csv_encoder;
pub mod json_array_encoder;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use crate::autovot::AutoVot;
pub use crate::classifier::{Classifier, ExternalClassifier, ExternalTools};
pub use crate::opts::{DecodeOpts, MarkFilter, TierDefinitions, TrainOpts};
pub use crate::textgrid::TextGrid;
