//! Content moderation
//!
//! Information Hiding:
//! - Pattern sets and tier ordering hidden behind `ContentClassifier::classify`
//! - Model backends hidden behind `ProbabilisticClassifier`
//! - Attempt windows and ban bookkeeping hidden behind `AbuseTracker`

pub mod classifier;
pub mod patterns;
pub mod tracker;

pub use classifier::{
    ContentClassifier, HttpClassifier, NoopClassifier, Prediction, ProbabilisticClassifier,
    Verdict, VerdictReason,
};
pub use tracker::{AbuseTracker, AttemptDecision, AttemptReason, BanStatus};
