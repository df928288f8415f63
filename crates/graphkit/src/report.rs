//! Outcome aggregation.
//!
//! A [`Report`] is an owned accumulator threaded through a run. It keeps
//! every per-pair outcome and derives the summary on demand, keeping
//! "write accepted" and "follow verified" apart.

use crate::types::FollowOutcome;
use serde::{Deserialize, Serialize};

/// A (user, site) pair that needs manual follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRef {
    /// User identifier.
    pub user: String,
    /// Site identifier.
    pub site: String,
}

/// Summary counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Pairs processed.
    pub total: usize,
    /// Pairs with an accepted write (or already following).
    pub succeeded: usize,
    /// Pairs with no accepted write.
    pub failed: usize,
    /// Pairs confirmed by a read.
    pub verified: usize,
    /// Pairs that were already following before the run.
    pub already_following: usize,
    /// Pairs not confirmed by a read, in processing order.
    pub unverified: Vec<PairRef>,
}

impl Summary {
    /// Every pair was verified.
    pub fn is_success(&self) -> bool {
        self.unverified.is_empty()
    }

    /// Pairs whose write was accepted but never confirmed.
    pub fn accepted_unverified(&self) -> usize {
        self.succeeded.saturating_sub(self.verified)
    }
}

/// Accumulated outcomes for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    outcomes: Vec<FollowOutcome>,
}

impl Report {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one pair.
    pub fn record(&mut self, outcome: FollowOutcome) {
        self.outcomes.push(outcome);
    }

    /// Outcomes in processing order.
    pub fn outcomes(&self) -> &[FollowOutcome] {
        &self.outcomes
    }

    /// Number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Compute summary counters.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.outcomes.len(),
            ..Default::default()
        };

        for outcome in &self.outcomes {
            if outcome.succeeded {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if outcome.verified {
                summary.verified += 1;
            } else {
                summary.unverified.push(PairRef {
                    user: outcome.user.clone(),
                    site: outcome.site.clone(),
                });
            }
            if outcome.was_already_following() {
                summary.already_following += 1;
            }
        }

        summary
    }
}
