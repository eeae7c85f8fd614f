//! Label groupings
//!
//! Raw audio comes in three directories (advert, music, talk). A `ModelKind`
//! decides how those raw classes are grouped into the classifier's outputs,
//! e.g. `Mo` merges advert and talk into a single "other" class.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::hyperparams::{hp_amt_best, hp_at_best, hp_baseline, hp_mo_best, ModelHyperparameters};

/// Raw dataset classes, one directory each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawClass {
    Advert,
    Music,
    Talk,
}

impl RawClass {
    /// All raw classes in directory order
    pub fn all() -> &'static [Self] {
        &[Self::Advert, Self::Music, Self::Talk]
    }

    /// Directory (and cache file stem) name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advert => "advert",
            Self::Music => "music",
            Self::Talk => "talk",
        }
    }

    /// Parse a directory name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "advert" => Some(Self::Advert),
            "music" => Some(Self::Music),
            "talk" => Some(Self::Talk),
            _ => None,
        }
    }
}

impl fmt::Display for RawClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Label grouping strategies, selected on the command line by key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// advert vs music vs talk
    Amt,
    /// music vs other (advert + talk)
    Mo,
    /// advert vs talk
    At,
    /// advert vs other (music + talk)
    Ao,
}

impl ModelKind {
    pub fn all() -> &'static [Self] {
        &[Self::Amt, Self::Mo, Self::At, Self::Ao]
    }

    /// Command line key
    pub fn key(&self) -> &'static str {
        match self {
            Self::Amt => "amt",
            Self::Mo => "mo",
            Self::At => "at",
            Self::Ao => "ao",
        }
    }

    /// Output class names; the index is the label id
    pub fn class_names(&self) -> Vec<String> {
        let names: &[&str] = match self {
            Self::Amt => &["advert", "music", "talk"],
            Self::Mo => &["music", "other"],
            Self::At => &["advert", "talk"],
            Self::Ao => &["advert", "other"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Raw classes feeding each output class, in label order
    pub fn groups(&self) -> Vec<Vec<RawClass>> {
        use RawClass::*;
        match self {
            Self::Amt => vec![vec![Advert], vec![Music], vec![Talk]],
            Self::Mo => vec![vec![Music], vec![Advert, Talk]],
            Self::At => vec![vec![Advert], vec![Talk]],
            Self::Ao => vec![vec![Advert], vec![Music, Talk]],
        }
    }

    /// Best known head for this grouping
    pub fn default_hyperparameters(&self) -> ModelHyperparameters {
        match self {
            Self::Amt => hp_amt_best(),
            Self::Mo => hp_mo_best(),
            Self::At => hp_at_best(),
            Self::Ao => hp_baseline(),
        }
    }

    /// Name of the persisted model
    pub fn model_name(&self) -> String {
        format!("adbanda_{}", self.key())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| format!("unknown model configuration: {}", s))
    }
}

/// A grouping together with the head that classifies it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub classes: Vec<String>,
    pub hyperparams: ModelHyperparameters,
}

impl ModelConfig {
    /// Grouping with its best known hyperparameters
    pub fn for_kind(kind: ModelKind) -> Self {
        Self::with_hyperparameters(kind, kind.default_hyperparameters())
    }

    pub fn with_hyperparameters(kind: ModelKind, hyperparams: ModelHyperparameters) -> Self {
        Self {
            kind,
            classes: kind.class_names(),
            hyperparams,
        }
    }

    pub fn name(&self) -> String {
        self.kind.model_name()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}
