pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod ranker;
pub mod router;

pub use error::{RankingError, RankingResult};
pub use features::{EnrichedRow, FeatureEngineer};
pub use model::{BoundModel, FeatureColumn, FeatureMatrix, FeatureValue, LogisticModel, ScoringModel};
pub use pipeline::{PipelineContext, RankedRow, RankingPipeline};
pub use ranker::Ranker;
pub use router::{ModelRouter, TripShape};
