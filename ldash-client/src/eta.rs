//! Remaining-time estimation
//!
//! Two modes:
//! - Throughput: during the parsing stage, where processed/total line counts are meaningful.
//!   Remaining lines over observed speed, plus the average duration of every stage still to come.
//! - Fractional: everywhere else. Remaining overall fraction over the observed rate of progress.
//!
//! The estimator returns numbers or `Eta::Unknown`. Display formatting is left to UI adapters.

use crate::stages::StageProgressModel;
use ldash_common::config::EtaSettings;
use ldash_common::events::{Eta, StageId};
use std::time::Duration;

/// Stage whose unit counts drive throughput mode
const THROUGHPUT_STAGE: StageId = StageId::Parsing;

/// What the estimator needs from one status observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaInput {
    pub stage: Option<StageId>,
    pub processed_units: u64,
    pub total_units: u64,
    /// Monotonic overall percent, 0-100
    pub overall_percent: f64,
}

#[derive(Debug, Clone)]
pub struct EtaEstimator {
    settings: EtaSettings,
}

impl Default for EtaEstimator {
    fn default() -> Self {
        Self::new(EtaSettings::default())
    }
}

impl EtaEstimator {
    pub fn new(settings: EtaSettings) -> Self {
        Self { settings }
    }

    /// Average duration of `stage`, used as the allowance when it has not started yet
    pub fn allowance(&self, stage: StageId) -> f64 {
        match stage {
            StageId::CountingLines => self.settings.counting_lines_secs,
            StageId::Parsing => self.settings.parsing_secs,
            StageId::Finalization => self.settings.finalization_secs,
            StageId::Indexing => self.settings.indexing_secs,
            StageId::Statistics => self.settings.statistics_secs,
        }
    }

    /// Estimate seconds remaining for an operation running for `elapsed`
    pub fn remaining(&self, model: &StageProgressModel, elapsed: Duration, input: &EtaInput) -> Eta {
        if input.stage == Some(THROUGHPUT_STAGE) && input.total_units > 0 {
            self.throughput(model, elapsed, input)
        } else {
            self.fractional(elapsed, input.overall_percent)
        }
    }

    fn throughput(&self, model: &StageProgressModel, elapsed: Duration, input: &EtaInput) -> Eta {
        if input.processed_units >= input.total_units {
            return Eta::Seconds(0.0);
        }

        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs <= 0.0 {
            return Eta::Unknown;
        }
        let speed = input.processed_units as f64 / elapsed_secs;
        if !speed.is_finite() || speed <= 0.0 {
            return Eta::Unknown;
        }

        let remaining_units = (input.total_units - input.processed_units) as f64;
        let mut seconds = remaining_units / speed;

        if !model.is_final(THROUGHPUT_STAGE) {
            seconds += model
                .following(THROUGHPUT_STAGE)
                .iter()
                .map(|s| self.allowance(s.id))
                .sum::<f64>();
        }

        self.capped(seconds)
    }

    fn fractional(&self, elapsed: Duration, overall_percent: f64) -> Eta {
        let fraction = overall_percent / 100.0;
        if !fraction.is_finite() {
            return Eta::Unknown;
        }
        if fraction >= 1.0 {
            return Eta::Seconds(0.0);
        }

        let elapsed_secs = elapsed.as_secs_f64();
        if elapsed_secs <= 0.0 {
            return Eta::Unknown;
        }
        let speed = fraction / elapsed_secs;
        if !speed.is_finite() || speed <= 0.0 {
            return Eta::Unknown;
        }

        self.capped((1.0 - fraction) / speed)
    }

    fn capped(&self, seconds: f64) -> Eta {
        if !seconds.is_finite() {
            return Eta::Unknown;
        }
        Eta::Seconds(seconds.clamp(0.0, self.settings.ceiling_secs))
    }
}
