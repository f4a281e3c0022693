//! Window resolution — which sentiment applies to a time step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SentimentLabel;

use super::series::SentimentSeries;

/// Outcome of a window lookup. Absence of data is a valid outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Found(SentimentLabel),
    NotFound,
}

impl Resolution {
    /// Collapse to a label; `NotFound` becomes `Unknown`.
    pub fn label(self) -> SentimentLabel {
        match self {
            Self::Found(label) => label,
            Self::NotFound => SentimentLabel::Unknown,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Finds the latest observation in `(previous_step, current_step]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentWindowResolver;

impl SentimentWindowResolver {
    /// Resolve the sentiment for a step. Never fails.
    ///
    /// `previous_step` is `None` on the first step of a simulation, which
    /// always resolves to `NotFound`.
    pub fn resolve(
        previous_step: Option<DateTime<Utc>>,
        current_step: DateTime<Utc>,
        series: &SentimentSeries,
    ) -> Resolution {
        let Some(previous) = previous_step else {
            return Resolution::NotFound;
        };
        match series.observations_in(previous, current_step).last() {
            Some(obs) => Resolution::Found(obs.label),
            None => Resolution::NotFound,
        }
    }
}
