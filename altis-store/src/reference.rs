use crate::app_config::Config;
use crate::{StoreError, StoreResult};
use altis_core::AirportTable;
use altis_ranking::model::parse_columns;
use altis_ranking::{BoundModel, FeatureColumn, LogisticModel, PipelineContext, RankingError};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Parse { path: display, source })
}

/// Airport file: `{"SVO": {"tz": "Europe/Moscow", "country": "RU"}, ...}`
pub fn load_airports(path: impl AsRef<Path>) -> StoreResult<AirportTable> {
    let table: AirportTable = read_json(path.as_ref())?;
    tracing::info!("Loaded {} airports from {}", table.len(), path.as_ref().display());
    Ok(table)
}

pub fn load_model(path: impl AsRef<Path>) -> StoreResult<LogisticModel> {
    let model: LogisticModel = read_json(path.as_ref())?;
    tracing::info!(
        "Loaded model {:?} with {} terms from {}",
        model.name,
        model.terms.len(),
        path.as_ref().display()
    );
    Ok(model)
}

/// Bind a model to its configured column set, failing if the model reads
/// anything outside that set.
fn bind(name: &str, model: LogisticModel, columns: &[String]) -> StoreResult<BoundModel> {
    let columns: Vec<FeatureColumn> = parse_columns(columns)?;
    if let Some(missing) = model.columns()?.into_iter().find(|c| !columns.contains(c)) {
        return Err(RankingError::MissingColumn(missing.name().to_string()).into());
    }
    Ok(BoundModel::new(name, columns, Arc::new(model)))
}

/// Build the shared, read-only context once at startup.
pub fn build_context(config: &Config) -> StoreResult<PipelineContext> {
    let mut airports = load_airports(&config.reference.airports_path)?;
    let extended = AirportTable::from(config.reference.extended_airports.clone());
    if !extended.is_empty() {
        tracing::info!("Applying {} extended airport records", extended.len());
        airports.extend(extended);
    }

    let one_way = bind(
        "one_way",
        load_model(&config.models.one_way_path)?,
        &config.models.one_way_columns,
    )?;
    let round_trip = bind(
        "round_trip",
        load_model(&config.models.round_trip_path)?,
        &config.models.round_trip_columns,
    )?;

    Ok(PipelineContext {
        airports,
        one_way,
        round_trip,
    })
}
