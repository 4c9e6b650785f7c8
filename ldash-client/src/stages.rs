//! Stage-weighted progress model
//!
//! The remote pipeline reports progress per stage only. Each stage carries a fixed weight,
//! so an overall figure is the full weight of every finished stage plus the current stage's
//! weighted fraction. Without this the displayed percentage would jump backwards at every
//! stage boundary (100% of counting → 0% of parsing).

use crate::error::{ClientError, ClientResult};
use ldash_common::events::StageId;
use tokio::time::Instant;

/// Weight-sum tolerance for custom stage sets
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One pipeline stage and its share of the whole job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDefinition {
    pub id: StageId,
    pub display_name: &'static str,
    /// Fraction of the whole job, in (0, 1]
    pub weight: f64,
}

/// Standard pipeline stages in execution order
pub const STANDARD_STAGES: [StageDefinition; 5] = [
    StageDefinition {
        id: StageId::CountingLines,
        display_name: "Counting lines",
        weight: 0.05,
    },
    StageDefinition {
        id: StageId::Parsing,
        display_name: "Parsing",
        weight: 0.30,
    },
    StageDefinition {
        id: StageId::Finalization,
        display_name: "Finalization",
        weight: 0.20,
    },
    StageDefinition {
        id: StageId::Indexing,
        display_name: "Indexing",
        weight: 0.30,
    },
    StageDefinition {
        id: StageId::Statistics,
        display_name: "Statistics",
        weight: 0.15,
    },
];

/// Maps (stage, percent within stage) to an overall percent
#[derive(Debug, Clone)]
pub struct StageProgressModel {
    stages: Vec<StageDefinition>,
}

impl Default for StageProgressModel {
    fn default() -> Self {
        Self {
            stages: STANDARD_STAGES.to_vec(),
        }
    }
}

impl StageProgressModel {
    /// Build a model from an ordered stage set
    ///
    /// Each weight must be in (0, 1], ids must be unique and the weights must sum to 1.0.
    pub fn new(stages: Vec<StageDefinition>) -> ClientResult<Self> {
        if stages.is_empty() {
            return Err(ClientError::Config("stage set is empty".to_string()));
        }
        for (i, stage) in stages.iter().enumerate() {
            if !(stage.weight > 0.0 && stage.weight <= 1.0) {
                return Err(ClientError::Config(format!(
                    "stage {} weight {} outside (0, 1]",
                    stage.id, stage.weight
                )));
            }
            if stages[..i].iter().any(|s| s.id == stage.id) {
                return Err(ClientError::Config(format!("stage {} listed twice", stage.id)));
            }
        }
        let sum: f64 = stages.iter().map(|s| s.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ClientError::Config(format!(
                "stage weights sum to {}, expected 1.0",
                sum
            )));
        }
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Position of `stage` in execution order
    pub fn position(&self, stage: StageId) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage)
    }

    pub fn definition(&self, stage: StageId) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.id == stage)
    }

    pub fn is_final(&self, stage: StageId) -> bool {
        self.stages.last().is_some_and(|s| s.id == stage)
    }

    /// Stages that run after `stage`, in order
    pub fn following(&self, stage: StageId) -> &[StageDefinition] {
        match self.position(stage) {
            Some(index) => &self.stages[index + 1..],
            None => &[],
        }
    }

    /// Overall percent for `stage` at `stage_percent` within it
    ///
    /// Returns `None` for a stage not in this model. Non-finite input counts as 0%.
    /// The final stage at 100% is exactly 100.
    pub fn overall_percent(&self, stage: StageId, stage_percent: f64) -> Option<f64> {
        let index = self.position(stage)?;
        let fraction = clamp_percent(stage_percent) / 100.0;

        if index == self.stages.len() - 1 && fraction >= 1.0 {
            return Some(100.0);
        }

        let preceding: f64 = self.stages[..index].iter().map(|s| s.weight).sum();
        let overall = (preceding + self.stages[index].weight * fraction) * 100.0;
        Some(overall.clamp(0.0, 100.0))
    }

    /// Overall percent from a raw status
    ///
    /// Unrecognized stages fall back to the server's own overall figure (0 if absent).
    pub fn resolve(&self, stage: Option<StageId>, stage_percent: f64, server_overall: Option<f64>) -> f64 {
        stage
            .and_then(|s| self.overall_percent(s, stage_percent))
            .unwrap_or_else(|| clamp_percent(server_overall.unwrap_or(0.0)))
    }
}

/// Clamp to [0, 100], mapping NaN to 0
pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Per-session progress state enforcing monotonicity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedProgress {
    pub overall_percent: f64,
    pub stage: Option<StageId>,
    pub stage_percent: f64,
    /// When the current stage was first observed
    pub stage_started_at: Option<Instant>,
}

/// Tracks stage transitions within one operation
///
/// - Same stage reported lower than before → clamped to the previous maximum
/// - Transition to a later stage → stage percent legitimately restarts
/// - Overall percent never decreases until `reset()`
#[derive(Debug, Default)]
pub struct ProgressTracker {
    current_stage: Option<StageId>,
    stage_started_at: Option<Instant>,
    stage_max_percent: f64,
    overall_max: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one status observation into the tracker
    pub fn observe(
        &mut self,
        model: &StageProgressModel,
        stage: Option<StageId>,
        stage_percent: f64,
        server_overall: Option<f64>,
        now: Instant,
    ) -> TrackedProgress {
        let mut stage_percent = clamp_percent(stage_percent);
        let known_stage = stage.filter(|s| model.position(*s).is_some());

        if let Some(reported) = known_stage {
            match self.current_stage {
                Some(current) if current == reported => {
                    stage_percent = stage_percent.max(self.stage_max_percent);
                }
                Some(current) if model.position(reported) < model.position(current) => {
                    // Backwards stage report: keep the stage we already reached
                    stage_percent = self.stage_max_percent;
                }
                _ => {
                    self.current_stage = Some(reported);
                    self.stage_started_at = Some(now);
                }
            }
            self.stage_max_percent = stage_percent;
        }

        let stage_for_overall = known_stage.and(self.current_stage);
        let overall = model
            .resolve(stage_for_overall, stage_percent, server_overall)
            .max(self.overall_max);
        self.overall_max = overall;

        TrackedProgress {
            overall_percent: overall,
            stage: stage_for_overall,
            stage_percent,
            stage_started_at: self.stage_started_at,
        }
    }

    pub fn current_stage(&self) -> Option<StageId> {
        self.current_stage
    }

    pub fn stage_started_at(&self) -> Option<Instant> {
        self.stage_started_at
    }

    /// Back to initial values for the next operation
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
