//! `allocation` runs the full pipeline on an aligned price table and prints the
//! weight table.
//!
//! The CSV layout is `date,<ticker_1>,...,<ticker_n>` with ISO dates and one
//! row per trading day. Without `--prices` a cointegrated synthetic universe
//! is generated.

use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::PathBuf;

use allocation_rs::copulas::bivariate::SelectionCriterion;
use allocation_rs::quant::pipeline::run_pipeline;
use allocation_rs::quant::pipeline::PipelineConfig;
use allocation_rs::quant::pipeline::ResidualDefinition;
use allocation_rs::quant::pipeline::ScenarioSource;
use allocation_rs::quant::AssetUniverse;
use allocation_rs::quant::PriceTable;
use allocation_rs::stats::vecm::RankZeroPolicy;
use anyhow::bail;
use anyhow::Context;
use chrono::Duration;
use chrono::NaiveDate;
use clap::Parser;
use clap::ValueEnum;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::StandardNormal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Source {
  Posterior,
  Copula,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Residuals {
  Model,
  Demeaned,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Criterion {
  Aic,
  Bic,
  Mbicv,
}

/// Dependence-aware scenario generation and portfolio optimization
#[derive(Parser, Debug)]
#[command(name = "allocation")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Aligned price CSV (`date,<tickers...>`)
  #[arg(short, long)]
  prices: Option<PathBuf>,

  /// Assets of the synthetic universe when no CSV is given
  #[arg(long, default_value_t = 6)]
  assets: usize,

  /// Observations of the synthetic universe when no CSV is given
  #[arg(long, default_value_t = 500)]
  observations: usize,

  /// Scenarios drawn from the copula and the posterior
  #[arg(short = 'm', long, default_value_t = 1000)]
  scenarios: usize,

  /// Scenario matrix handed to the optimizer
  #[arg(long, value_enum, default_value = "posterior")]
  source: Source,

  /// Series fed to the rank transform
  #[arg(long, value_enum, default_value = "demeaned")]
  residuals: Residuals,

  /// Pair-copula selection criterion
  #[arg(long, value_enum, default_value = "mbicv")]
  criterion: Criterion,

  /// Vine truncation level (0 keeps every tree)
  #[arg(long, default_value_t = 0)]
  truncation: usize,

  /// Fall back to a VAR in differences when no cointegration is found
  #[arg(long)]
  allow_rank_zero: bool,

  /// Seed for every random draw
  #[arg(long)]
  seed: Option<u64>,
}

fn read_prices(path: &PathBuf) -> anyhow::Result<PriceTable> {
  let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
  parse_prices(BufReader::new(file))
}

fn parse_prices<R: Read>(input: R) -> anyhow::Result<PriceTable> {
  let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
  let tickers: Vec<String> = reader
    .headers()
    .context("reading price header")?
    .iter()
    .skip(1)
    .map(str::to_string)
    .collect();
  if tickers.is_empty() {
    bail!("price header lists no tickers");
  }

  let mut dates = Vec::new();
  let mut values = Vec::new();
  for (row, record) in reader.records().enumerate() {
    let record = record.with_context(|| format!("row {}", row + 1))?;
    let date = record.get(0).unwrap_or_default();
    dates.push(
      NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("row {}: bad date {date:?}", row + 1))?,
    );
    for field in record.iter().skip(1) {
      values.push(
        field
          .parse::<f64>()
          .with_context(|| format!("row {}: bad price {field:?}", row + 1))?,
      );
    }
  }

  let prices = Array2::from_shape_vec((dates.len(), tickers.len()), values)?;
  Ok(PriceTable::new(dates, AssetUniverse::new(tickers)?, prices)?)
}

/// One common random-walk trend plus mean-reverting idiosyncratic spreads,
/// so every pair of log prices is cointegrated.
fn synthetic_prices(n: usize, t: usize, seed: u64) -> anyhow::Result<PriceTable> {
  let mut rng = StdRng::seed_from_u64(seed);
  let start = NaiveDate::from_ymd_opt(2020, 1, 2).context("start date")?;
  let dates = (0..t).map(|i| start + Duration::days(i as i64)).collect();

  let mut trend = 0.0;
  let mut spread = vec![0.0; n];
  let mut sigma2: f64 = 1e-4;
  let mut prev = 0.0;
  let mut prices = Array2::<f64>::zeros((t, n));
  for i in 0..t {
    sigma2 = 2e-6 + 0.08 * prev * prev + 0.9 * sigma2;
    let z: f64 = StandardNormal.sample(&mut rng);
    prev = sigma2.sqrt() * z;
    trend += 0.0003 + prev;
    for (j, s) in spread.iter_mut().enumerate() {
      let e: f64 = StandardNormal.sample(&mut rng);
      *s = 0.9 * *s + 0.004 * e;
      let loading = 0.8 + 0.1 * j as f64;
      prices[[i, j]] = (50.0 + 10.0 * j as f64) * (loading * trend + *s).exp();
    }
  }

  let tickers: Vec<String> = (0..n).map(|j| format!("ASSET{}", j + 1)).collect();
  Ok(PriceTable::new(dates, AssetUniverse::new(tickers)?, prices)?)
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer())
    .with(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  let table = match &cli.prices {
    Some(path) => read_prices(path)?,
    None => synthetic_prices(cli.assets, cli.observations, cli.seed.unwrap_or(42))?,
  };
  info!(
    assets = table.universe().len(),
    observations = table.nobs(),
    "price table loaded"
  );

  let mut cfg = PipelineConfig::new(match cli.residuals {
    Residuals::Model => ResidualDefinition::ModelResiduals,
    Residuals::Demeaned => ResidualDefinition::DemeanedReturns,
  });
  cfg.scenario_source = match cli.source {
    Source::Posterior => ScenarioSource::Posterior,
    Source::Copula => ScenarioSource::Copula,
  };
  cfg.vine.criterion = match cli.criterion {
    Criterion::Aic => SelectionCriterion::Aic,
    Criterion::Bic => SelectionCriterion::Bic,
    Criterion::Mbicv => SelectionCriterion::Mbicv,
  };
  cfg.vine.truncation = cli.truncation;
  if cli.allow_rank_zero {
    cfg.vecm.rank_zero = RankZeroPolicy::DifferencedVar;
  }
  cfg.n_scenarios = cli.scenarios;
  cfg.seed = cli.seed;

  let output = run_pipeline(&table, &cfg).context("allocation pipeline failed")?;

  println!("{}", output.vine);
  println!("views q: {:?}", output.views.q.to_vec());
  println!("posterior mean: {:?}", output.posterior.mean.to_vec());
  println!("{}", output.weights);

  Ok(())
}
