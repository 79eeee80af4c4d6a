use crate::error::{RankingError, RankingResult};
use crate::features::EnrichedRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Feature Columns
// ============================================================================

/// A named column a scoring model may consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureColumn {
    Amount,
    SegmentCount,
    IsBaggage,
    IsRefundPermitted,
    IsExchangePermitted,
    TravellerGrade,
    DepForw,
    ArrForw,
    DepBack,
    ArrBack,
    DepForwCountry,
    ArrForwCountry,
    DepBackCountry,
    ArrBackCountry,
    ForwHours,
    BackHours,
    TotalHours,
    ForwHoursDiffMin,
    ForwHoursDiffMean,
    BackHoursDiffMin,
    BackHoursDiffMean,
    PriceDiffMinPerc,
    PriceDiffMeanPerc,
    ReqDepHoursDiff,
    ReqRetHoursDiff,
    IsDirect,
}

impl FeatureColumn {
    pub const ALL: [FeatureColumn; 26] = [
        FeatureColumn::Amount,
        FeatureColumn::SegmentCount,
        FeatureColumn::IsBaggage,
        FeatureColumn::IsRefundPermitted,
        FeatureColumn::IsExchangePermitted,
        FeatureColumn::TravellerGrade,
        FeatureColumn::DepForw,
        FeatureColumn::ArrForw,
        FeatureColumn::DepBack,
        FeatureColumn::ArrBack,
        FeatureColumn::DepForwCountry,
        FeatureColumn::ArrForwCountry,
        FeatureColumn::DepBackCountry,
        FeatureColumn::ArrBackCountry,
        FeatureColumn::ForwHours,
        FeatureColumn::BackHours,
        FeatureColumn::TotalHours,
        FeatureColumn::ForwHoursDiffMin,
        FeatureColumn::ForwHoursDiffMean,
        FeatureColumn::BackHoursDiffMin,
        FeatureColumn::BackHoursDiffMean,
        FeatureColumn::PriceDiffMinPerc,
        FeatureColumn::PriceDiffMeanPerc,
        FeatureColumn::ReqDepHoursDiff,
        FeatureColumn::ReqRetHoursDiff,
        FeatureColumn::IsDirect,
    ];

    /// Column name as it appears in batches and model files
    pub fn name(&self) -> &'static str {
        match self {
            FeatureColumn::Amount => "Amount",
            FeatureColumn::SegmentCount => "SegmentCount",
            FeatureColumn::IsBaggage => "IsBaggage",
            FeatureColumn::IsRefundPermitted => "isRefundPermitted",
            FeatureColumn::IsExchangePermitted => "isExchangePermitted",
            FeatureColumn::TravellerGrade => "TravellerGrade",
            FeatureColumn::DepForw => "dep_forw",
            FeatureColumn::ArrForw => "arr_forw",
            FeatureColumn::DepBack => "dep_back",
            FeatureColumn::ArrBack => "arr_back",
            FeatureColumn::DepForwCountry => "dep_forw_country",
            FeatureColumn::ArrForwCountry => "arr_forw_country",
            FeatureColumn::DepBackCountry => "dep_back_country",
            FeatureColumn::ArrBackCountry => "arr_back_country",
            FeatureColumn::ForwHours => "forw_hours",
            FeatureColumn::BackHours => "back_hours",
            FeatureColumn::TotalHours => "total_hours",
            FeatureColumn::ForwHoursDiffMin => "forw_hours_diff_min",
            FeatureColumn::ForwHoursDiffMean => "forw_hours_diff_mean",
            FeatureColumn::BackHoursDiffMin => "back_hours_diff_min",
            FeatureColumn::BackHoursDiffMean => "back_hours_diff_mean",
            FeatureColumn::PriceDiffMinPerc => "price_diff_min_perc",
            FeatureColumn::PriceDiffMeanPerc => "price_diff_mean_perc",
            FeatureColumn::ReqDepHoursDiff => "req_dep_hours_diff",
            FeatureColumn::ReqRetHoursDiff => "req_ret_hours_diff",
            FeatureColumn::IsDirect => "is_direct",
        }
    }

    pub fn extract(&self, row: &EnrichedRow) -> FeatureValue {
        let it = &row.itinerary;
        let flag = |v: u8| FeatureValue::Numeric(Some(f64::from(v)));
        let code = |c: &str| FeatureValue::Categorical((!c.is_empty()).then(|| c.to_string()));
        match self {
            FeatureColumn::Amount => FeatureValue::Numeric(it.amount),
            FeatureColumn::SegmentCount => FeatureValue::Numeric(it.segment_count.map(|c| c as f64)),
            FeatureColumn::IsBaggage => flag(it.is_baggage),
            FeatureColumn::IsRefundPermitted => flag(it.is_refund_permitted),
            FeatureColumn::IsExchangePermitted => flag(it.is_exchange_permitted),
            FeatureColumn::TravellerGrade => FeatureValue::Categorical(Some(it.traveller_grade.clone())),
            FeatureColumn::DepForw => code(&row.airports.dep_forw),
            FeatureColumn::ArrForw => code(&row.airports.arr_forw),
            FeatureColumn::DepBack => code(&row.airports.dep_back),
            FeatureColumn::ArrBack => code(&row.airports.arr_back),
            FeatureColumn::DepForwCountry => FeatureValue::Categorical(row.dep_forw_country.clone()),
            FeatureColumn::ArrForwCountry => FeatureValue::Categorical(row.arr_forw_country.clone()),
            FeatureColumn::DepBackCountry => FeatureValue::Categorical(row.dep_back_country.clone()),
            FeatureColumn::ArrBackCountry => FeatureValue::Categorical(row.arr_back_country.clone()),
            FeatureColumn::ForwHours => FeatureValue::Numeric(row.forw_hours),
            FeatureColumn::BackHours => FeatureValue::Numeric(row.back_hours),
            FeatureColumn::TotalHours => FeatureValue::Numeric(row.total_hours),
            FeatureColumn::ForwHoursDiffMin => FeatureValue::Numeric(row.forw_hours_diff_min),
            FeatureColumn::ForwHoursDiffMean => FeatureValue::Numeric(row.forw_hours_diff_mean),
            FeatureColumn::BackHoursDiffMin => FeatureValue::Numeric(row.back_hours_diff_min),
            FeatureColumn::BackHoursDiffMean => FeatureValue::Numeric(row.back_hours_diff_mean),
            FeatureColumn::PriceDiffMinPerc => FeatureValue::Numeric(row.price_diff_min_perc),
            FeatureColumn::PriceDiffMeanPerc => FeatureValue::Numeric(row.price_diff_mean_perc),
            FeatureColumn::ReqDepHoursDiff => FeatureValue::Numeric(row.req_dep_hours_diff),
            FeatureColumn::ReqRetHoursDiff => FeatureValue::Numeric(row.req_ret_hours_diff),
            FeatureColumn::IsDirect => flag(row.is_direct),
        }
    }
}

impl FromStr for FeatureColumn {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureColumn::ALL
            .iter()
            .copied()
            .find(|column| column.name() == s)
            .ok_or_else(|| RankingError::UnknownColumn(s.to_string()))
    }
}

impl std::fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a list of configured column names.
pub fn parse_columns<S: AsRef<str>>(names: &[S]) -> RankingResult<Vec<FeatureColumn>> {
    names.iter().map(|name| name.as_ref().parse()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(Option<f64>),
    Categorical(Option<String>),
}

/// Rows x named columns, in batch order
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    columns: Vec<FeatureColumn>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureMatrix {
    pub fn build(rows: &[EnrichedRow], columns: &[FeatureColumn]) -> Self {
        let rows = rows
            .iter()
            .map(|row| columns.iter().map(|column| column.extract(row)).collect())
            .collect();
        Self {
            columns: columns.to_vec(),
            rows,
        }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: FeatureColumn) -> RankingResult<usize> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .ok_or_else(|| RankingError::MissingColumn(column.name().to_string()))
    }
}

// ============================================================================
// Scoring Models
// ============================================================================

/// The one capability the ranking path needs from a trained model
pub trait ScoringModel: Send + Sync {
    /// Probability of the positive class for every row of `features`.
    fn predict_proba(&self, features: &FeatureMatrix) -> RankingResult<Vec<f64>>;
}

/// A model together with the fixed column set it is fed
#[derive(Clone)]
pub struct BoundModel {
    pub name: String,
    pub columns: Vec<FeatureColumn>,
    pub model: Arc<dyn ScoringModel>,
}

impl BoundModel {
    pub fn new(name: impl Into<String>, columns: Vec<FeatureColumn>, model: Arc<dyn ScoringModel>) -> Self {
        Self {
            name: name.into(),
            columns,
            model,
        }
    }
}

impl std::fmt::Debug for BoundModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundModel")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// One additive term of a [`LogisticModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogisticTerm {
    Numeric {
        column: String,
        weight: f64,
        /// Value used when the feature is missing
        #[serde(default)]
        impute: f64,
    },
    Categorical {
        column: String,
        categories: HashMap<String, f64>,
        /// Weight for missing or unseen categories
        #[serde(default)]
        default: f64,
    },
}

impl LogisticTerm {
    fn column(&self) -> &str {
        match self {
            LogisticTerm::Numeric { column, .. } | LogisticTerm::Categorical { column, .. } => column.as_str(),
        }
    }

    fn contribution(&self, value: &FeatureValue) -> RankingResult<f64> {
        match (self, value) {
            (LogisticTerm::Numeric { weight, impute, .. }, FeatureValue::Numeric(v)) => {
                Ok(weight * v.unwrap_or(*impute))
            }
            (LogisticTerm::Categorical { categories, default, .. }, FeatureValue::Categorical(v)) => Ok(v
                .as_deref()
                .and_then(|category| categories.get(category))
                .copied()
                .unwrap_or(*default)),
            _ => Err(RankingError::Inference(format!(
                "column {} has the wrong kind for its model term",
                self.column()
            ))),
        }
    }
}

/// Logistic regression over numeric and one-hot categorical features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    #[serde(default)]
    pub name: String,
    pub intercept: f64,
    pub terms: Vec<LogisticTerm>,
}

impl LogisticModel {
    /// Columns the model reads, in term order
    pub fn columns(&self) -> RankingResult<Vec<FeatureColumn>> {
        self.terms.iter().map(|term| term.column().parse()).collect()
    }
}

impl ScoringModel for LogisticModel {
    fn predict_proba(&self, features: &FeatureMatrix) -> RankingResult<Vec<f64>> {
        let indices: Vec<usize> = self
            .terms
            .iter()
            .map(|term| -> RankingResult<usize> {
                let column: FeatureColumn = term.column().parse()?;
                features.column_index(column)
            })
            .collect::<RankingResult<_>>()?;

        features
            .rows()
            .iter()
            .map(|row| -> RankingResult<f64> {
                let mut logit = self.intercept;
                for (term, idx) in self.terms.iter().zip(&indices) {
                    logit += term.contribution(&row[*idx])?;
                }
                Ok(sigmoid(logit))
            })
            .collect()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
