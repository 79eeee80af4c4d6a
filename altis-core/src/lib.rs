pub mod iata;
pub mod search;
pub mod timezone;

pub use iata::{AirportRecord, AirportResolver, AirportTable, RouteAirports};
pub use search::{Itinerary, ItineraryRow};
pub use timezone::TimeConverter;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input batch: {0}")]
    InvalidInput(String),
    #[error("Reference data error: {0}")]
    Reference(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
