use crate::error::RankingResult;
use crate::features::{EnrichedRow, FeatureEngineer};
use crate::model::BoundModel;
use crate::ranker::Ranker;
use crate::router::ModelRouter;
use altis_core::{AirportTable, ItineraryRow};
use serde::Serialize;

/// Immutable reference data and models, built once at startup and shared
/// read-only by every batch.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub airports: AirportTable,
    pub one_way: BoundModel,
    pub round_trip: BoundModel,
}

/// Final output row: features, probability and in-request rank
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    /// Input key when the batch was an index-keyed object
    #[serde(skip)]
    pub row_key: Option<String>,
    #[serde(flatten)]
    pub row: EnrichedRow,
    pub probas: f64,
    pub rank_level: u32,
}

pub struct RankingPipeline;

impl RankingPipeline {
    /// Transform, score and rank one batch. Output keeps input row order.
    pub fn rank_batch(context: &PipelineContext, rows: &[ItineraryRow]) -> RankingResult<Vec<RankedRow>> {
        let enriched = FeatureEngineer::new(&context.airports).transform(rows);
        let probabilities = ModelRouter::new(context).score(&enriched)?;
        let ranks = Ranker::rank(&enriched, &probabilities)?;

        Ok(rows
            .iter()
            .zip(enriched)
            .zip(probabilities)
            .zip(ranks)
            .map(|(((input, row), probas), rank_level)| RankedRow {
                row_key: input.row_key.clone(),
                row,
                probas,
                rank_level,
            })
            .collect())
    }

    /// Parse a JSON batch (array or index-keyed object) and rank it.
    pub fn rank_json(context: &PipelineContext, batch: serde_json::Value) -> RankingResult<Vec<RankedRow>> {
        let rows = ItineraryRow::parse_batch(batch)?;
        tracing::debug!("Parsed batch of {} rows", rows.len());
        Self::rank_batch(context, &rows)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use altis_core::{Itinerary, RouteAirports};

    /// An enriched row with every optional feature missing
    pub(crate) fn blank_row(request_id: &str) -> EnrichedRow {
        EnrichedRow {
            itinerary: Itinerary {
                request_id: request_id.to_string(),
                request_date: None,
                request_departure_date: None,
                request_return_date: None,
                search_route: String::new(),
                departure_date: None,
                arrival_date: None,
                return_departure_date: None,
                return_arrival_date: None,
                segment_count: None,
                amount: None,
                is_baggage: 0,
                is_refund_permitted: 0,
                is_exchange_permitted: 0,
                traveller_grade: "Unknown".to_string(),
            },
            airports: RouteAirports::default(),
            dep_forw_tz: None,
            dep_forw_country: None,
            arr_forw_tz: None,
            arr_forw_country: None,
            dep_back_tz: None,
            dep_back_country: None,
            arr_back_tz: None,
            arr_back_country: None,
            departure_date_conv: None,
            return_departure_date_conv: None,
            forw_hours: None,
            back_hours: None,
            total_hours: None,
            forw_hours_diff_min: None,
            forw_hours_diff_mean: None,
            back_hours_diff_min: None,
            back_hours_diff_mean: None,
            price_diff_min_perc: None,
            price_diff_mean_perc: None,
            req_dep_hours_diff: None,
            req_ret_hours_diff: None,
            is_direct: 0,
        }
    }

    #[test]
    fn test_ranked_row_serializes_flat() {
        let ranked = RankedRow {
            row_key: Some("7".to_string()),
            row: blank_row("r9"),
            probas: 0.25,
            rank_level: 1,
        };
        let value = serde_json::to_value(&ranked).unwrap();
        assert_eq!(value["RequestID"], "r9");
        assert_eq!(value["probas"], 0.25);
        assert_eq!(value["rank_level"], 1);
        assert!(value["forw_hours"].is_null());
        assert!(value.get("row_key").is_none());
    }
}
