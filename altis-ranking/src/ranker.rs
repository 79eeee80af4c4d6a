use crate::error::{RankingError, RankingResult};
use crate::features::EnrichedRow;
use std::collections::HashMap;

/// Within-request ranking by predicted probability
pub struct Ranker;

impl Ranker {
    /// Rank every row inside its `RequestID` group: 1 is the highest
    /// probability, ties keep input order. Ranks in a group are exactly 1..=N.
    pub fn rank(rows: &[EnrichedRow], probabilities: &[f64]) -> RankingResult<Vec<u32>> {
        Self::rank_groups(
            rows.iter().map(|row| row.itinerary.request_id.as_str()),
            probabilities,
        )
    }

    /// Same as [`Ranker::rank`] over bare group keys, one key per probability.
    pub fn rank_groups<'k>(
        keys: impl IntoIterator<Item = &'k str>,
        probabilities: &[f64],
    ) -> RankingResult<Vec<u32>> {
        let keys: Vec<&str> = keys.into_iter().collect();
        if keys.len() != probabilities.len() {
            return Err(RankingError::ShapeMismatch {
                expected: keys.len(),
                actual: probabilities.len(),
            });
        }

        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, key) in keys.into_iter().enumerate() {
            groups.entry(key).or_default().push(idx);
        }

        let mut ranks = vec![0u32; probabilities.len()];
        for members in groups.values_mut() {
            // stable sort keeps first-seen order among equal probabilities
            members.sort_by(|&a, &b| score_key(probabilities[b]).total_cmp(&score_key(probabilities[a])));
            for (position, &idx) in members.iter().enumerate() {
                ranks[idx] = position as u32 + 1;
            }
        }

        tracing::debug!("Ranked {} rows in {} groups", ranks.len(), groups.len());
        Ok(ranks)
    }
}

/// NaN sorts last instead of first
fn score_key(p: f64) -> f64 {
    if p.is_nan() {
        f64::NEG_INFINITY
    } else {
        p
    }
}
