use altis_core::AirportRecord;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub models: ModelsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReferenceConfig {
    pub airports_path: String,
    /// Added to (and overriding) the airport file
    #[serde(default)]
    pub extended_airports: HashMap<String, AirportRecord>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    pub one_way_path: String,
    pub round_trip_path: String,
    #[serde(default = "default_one_way_columns")]
    pub one_way_columns: Vec<String>,
    #[serde(default = "default_round_trip_columns")]
    pub round_trip_columns: Vec<String>,
}

const ONE_WAY_COLUMNS: &[&str] = &[
    "Amount",
    "SegmentCount",
    "IsBaggage",
    "isRefundPermitted",
    "isExchangePermitted",
    "TravellerGrade",
    "dep_forw_country",
    "arr_forw_country",
    "forw_hours",
    "forw_hours_diff_min",
    "forw_hours_diff_mean",
    "price_diff_min_perc",
    "price_diff_mean_perc",
    "req_dep_hours_diff",
    "is_direct",
];

const ROUND_TRIP_EXTRA_COLUMNS: &[&str] = &[
    "dep_back_country",
    "arr_back_country",
    "back_hours",
    "total_hours",
    "back_hours_diff_min",
    "back_hours_diff_mean",
    "req_ret_hours_diff",
];

fn default_one_way_columns() -> Vec<String> {
    ONE_WAY_COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn default_round_trip_columns() -> Vec<String> {
    ONE_WAY_COLUMNS
        .iter()
        .chain(ROUND_TRIP_EXTRA_COLUMNS)
        .map(|c| c.to_string())
        .collect()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_dir("config")
    }

    /// Layered load: `{dir}/default`, optional `{dir}/{RUN_MODE}` and `{dir}/local`,
    /// then `ALTIS__*` environment overrides.
    pub fn load_from_dir(dir: &str) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            .add_source(config::File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            // e.g. `ALTIS__MODELS__ONE_WAY_PATH=/srv/one_way.json`
            .add_source(config::Environment::with_prefix("ALTIS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
