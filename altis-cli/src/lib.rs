use anyhow::Context;
use altis_ranking::{PipelineContext, RankedRow, RankingPipeline};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "altis-rank",
    about = "Score and rank flight itineraries within each search request",
    after_help = "Examples:\n  altis-rank rank --input batch.json --pretty\n  cat batch.json | altis-rank rank\n  altis-rank check-config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Rank a JSON batch of itinerary rows (array or index-keyed object)")]
    Rank {
        #[arg(long, default_value = "-", help = "Input file, or - for stdin")]
        input: String,
        #[arg(long, help = "Output file (defaults to stdout)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Pretty-print the JSON output")]
        pretty: bool,
    },
    #[command(about = "Load configuration, airports and models, then print a summary")]
    CheckConfig,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = altis_store::Config::load().context("Failed to load config")?;
    let context = altis_store::build_context(&config).context("Failed to load reference data")?;
    tracing::info!(
        "Pipeline ready: {} airports, models {} / {}",
        context.airports.len(),
        context.one_way.name,
        context.round_trip.name
    );

    match cli.command {
        Command::Rank { input, output, pretty } => {
            let reader: Box<dyn Read> = if input == "-" {
                Box::new(io::stdin().lock())
            } else {
                Box::new(BufReader::new(
                    File::open(&input).with_context(|| format!("Failed to open {}", input))?,
                ))
            };
            let ranked = rank_reader(&context, reader)?;

            let writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
                )),
                None => Box::new(io::stdout().lock()),
            };
            write_ranked(writer, &ranked, pretty)
        }
        Command::CheckConfig => {
            let summary = ContextSummary::from(&context);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

/// Read one JSON batch and run the full pipeline over it.
pub fn rank_reader(context: &PipelineContext, reader: impl Read) -> anyhow::Result<Vec<RankedRow>> {
    let batch: serde_json::Value = serde_json::from_reader(reader).context("Input is not valid JSON")?;
    let ranked = RankingPipeline::rank_json(context, batch).context("Failed to rank batch")?;
    tracing::info!("Ranked {} rows", ranked.len());
    Ok(ranked)
}

/// Write ranked rows in the shape they came in: an object keyed by the input
/// row keys for index-keyed batches, an array otherwise.
pub fn write_ranked(mut writer: impl Write, ranked: &[RankedRow], pretty: bool) -> anyhow::Result<()> {
    let keyed = !ranked.is_empty() && ranked.iter().all(|row| row.row_key.is_some());
    let output = if keyed {
        let mut rows = serde_json::Map::with_capacity(ranked.len());
        for row in ranked {
            let key = row.row_key.clone().unwrap_or_default();
            rows.insert(key, serde_json::to_value(row)?);
        }
        serde_json::Value::Object(rows)
    } else {
        serde_json::to_value(ranked)?
    };

    if pretty {
        serde_json::to_writer_pretty(&mut writer, &output)?;
    } else {
        serde_json::to_writer(&mut writer, &output)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ContextSummary {
    pub airports: usize,
    pub one_way_model: String,
    pub one_way_columns: Vec<&'static str>,
    pub round_trip_model: String,
    pub round_trip_columns: Vec<&'static str>,
}

impl From<&PipelineContext> for ContextSummary {
    fn from(context: &PipelineContext) -> Self {
        Self {
            airports: context.airports.len(),
            one_way_model: context.one_way.name.clone(),
            one_way_columns: context.one_way.columns.iter().map(|c| c.name()).collect(),
            round_trip_model: context.round_trip.name.clone(),
            round_trip_columns: context.round_trip.columns.iter().map(|c| c.name()).collect(),
        }
    }
}
