//! Domain types shared by the pipeline, repositories and handlers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-breed probability distribution keyed by breed label
pub type Probabilities = BTreeMap<String, f64>;

/// The four user-supplied trait scores, each on a 0-5 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitScores {
    pub head_size: f64,
    pub leg_condition: f64,
    pub coat_quality: f64,
    pub overall_fitness: f64,
}

impl TraitScores {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 5.0;
    pub const DEFAULT_SCORE: f64 = 3.0;

    pub fn new(head_size: f64, leg_condition: f64, coat_quality: f64, overall_fitness: f64) -> Self {
        Self {
            head_size,
            leg_condition,
            coat_quality,
            overall_fitness,
        }
    }

    /// Scores in the order the model's auxiliary input expects:
    /// `[head_size, leg_condition, coat_quality, overall_fitness]`
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.head_size,
            self.leg_condition,
            self.coat_quality,
            self.overall_fitness,
        ]
    }

    /// Scores paired with their field names, same order as [`Self::as_array`]
    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            ("head_size", self.head_size),
            ("leg_condition", self.leg_condition),
            ("coat_quality", self.coat_quality),
            ("overall_fitness", self.overall_fitness),
        ]
    }

    /// Composite rating: arithmetic mean of the four scores
    pub fn rating(&self) -> f64 {
        self.as_array().iter().sum::<f64>() / 4.0
    }
}

impl Default for TraitScores {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_SCORE,
            Self::DEFAULT_SCORE,
            Self::DEFAULT_SCORE,
            Self::DEFAULT_SCORE,
        )
    }
}

/// Public view of an account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Stored credentials for login verification
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub password_salt: String,
}

/// A prediction ready to be persisted
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub user_id: i64,
    pub breed: String,
    pub confidence: f64,
    pub rating: f64,
    pub traits: TraitScores,
    pub is_fallback: bool,
    /// Base64-encoded PNG explanation overlay
    pub explanation_png: String,
    pub probabilities: Probabilities,
}

/// A persisted prediction
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    pub id: i64,
    pub user_id: i64,
    pub breed: String,
    pub confidence: f64,
    pub rating: f64,
    pub traits: TraitScores,
    pub is_fallback: bool,
    pub explanation_png: String,
    pub probabilities: Probabilities,
    pub created_at: DateTime<Utc>,
}

/// Lightweight history row (no explanation image)
#[derive(Debug, Clone)]
pub struct PredictionSummary {
    pub id: i64,
    pub breed: String,
    pub confidence: f64,
    pub rating: f64,
    pub is_fallback: bool,
    pub probabilities: Probabilities,
    pub created_at: DateTime<Utc>,
}
