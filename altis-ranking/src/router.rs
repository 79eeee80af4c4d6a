use crate::error::{RankingError, RankingResult};
use crate::features::EnrichedRow;
use crate::model::{BoundModel, FeatureMatrix};
use crate::pipeline::PipelineContext;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripShape {
    OneWay,
    RoundTrip,
}

/// Picks the one-way or round-trip model for a whole batch and scores it.
pub struct ModelRouter<'a> {
    one_way: &'a BoundModel,
    round_trip: &'a BoundModel,
}

impl<'a> ModelRouter<'a> {
    pub fn new(context: &'a PipelineContext) -> Self {
        Self {
            one_way: &context.one_way,
            round_trip: &context.round_trip,
        }
    }

    /// Batch-level decision: a single row without a return duration sends
    /// every row, round trips included, to the one-way model.
    pub fn route(rows: &[EnrichedRow]) -> TripShape {
        if rows.iter().any(|row| row.back_hours.is_none()) {
            TripShape::OneWay
        } else {
            TripShape::RoundTrip
        }
    }

    pub fn model_for(&self, shape: TripShape) -> &'a BoundModel {
        match shape {
            TripShape::OneWay => self.one_way,
            TripShape::RoundTrip => self.round_trip,
        }
    }

    /// One probability per row, in row order.
    pub fn score(&self, rows: &[EnrichedRow]) -> RankingResult<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let shape = Self::route(rows);
        let bound = self.model_for(shape);
        tracing::info!("Scoring {} rows with {:?} model {}", rows.len(), shape, bound.name);

        let features = FeatureMatrix::build(rows, &bound.columns);
        let probabilities = bound.model.predict_proba(&features)?;

        if probabilities.len() != rows.len() {
            return Err(RankingError::ShapeMismatch {
                expected: rows.len(),
                actual: probabilities.len(),
            });
        }
        if let Some(bad) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(RankingError::Inference(format!(
                "model {} returned probability {} outside [0, 1]",
                bound.name, bad
            )));
        }

        Ok(probabilities)
    }
}
