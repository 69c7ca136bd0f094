use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mlb_oracle::assemble::FeatureBuilder;
use mlb_oracle::config::Config;
use mlb_oracle::cycle::DailyCycle;
use mlb_oracle::elo::EloTable;
use mlb_oracle::fake_provider::FakeStatsProvider;
use mlb_oracle::ids::Resolver;
use mlb_oracle::ledger::Ledger;
use mlb_oracle::odds_fetch::{NoOdds, OddsSource, TheOddsApi};
use mlb_oracle::predict::{ModelRegistry, Predictor};
use mlb_oracle::publish::{LogPublisher, PublishQueue, run_due};
use mlb_oracle::reconcile::reconcile;
use mlb_oracle::stats_api::{MlbStatsApi, StatsProvider};

#[derive(Parser)]
#[command(name = "mlb_oracle")]
#[command(about = "Daily MLB winner predictions with outcome tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Serve a generated demo league instead of the live stats API
    #[arg(long, global = true)]
    offline: bool,

    /// Model name, overrides SELECTED_MODEL
    #[arg(short, long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile yesterday, predict today, queue publish jobs
    Cycle {
        /// Stay up and publish each job when it comes due
        #[arg(long)]
        wait: bool,
    },
    /// Predict a single game and print the result
    Predict {
        game_id: u64,
    },
    /// Fill in results for every finished prediction
    Reconcile,
    /// Show or rebuild the team identity cache
    Ids {
        #[arg(long)]
        regenerate: bool,
    },
    /// Write the ledger as a spreadsheet
    Export {
        #[arg(default_value = "data/predictions.xlsx")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(model) = cli.model {
        cfg.model = model;
    }

    let provider: Box<dyn StatsProvider> = if cli.offline {
        let today = Utc::now().with_timezone(&cfg.publish.tz).date_naive();
        info!(%today, "offline mode: serving demo league");
        Box::new(FakeStatsProvider::demo(today, 7))
    } else {
        Box::new(MlbStatsApi::new(cfg.retry))
    };
    let provider = provider.as_ref();
    let ledger = Ledger::new(&cfg.ledger_path);

    match cli.command {
        Commands::Ids { regenerate } => {
            let resolver = if regenerate {
                Resolver::regenerate(&cfg.ids_cache_path, provider)?
            } else {
                resolver_for(&cfg, provider, cli.offline)?
            };
            for team in resolver.teams() {
                println!(
                    "{:>4}  {:<4} {:<28} {}",
                    team.id,
                    team.abbreviation,
                    team.name,
                    team.division.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Export { out } => {
            let rows = ledger
                .export_xlsx(&out)
                .with_context(|| format!("export ledger to {}", out.display()))?;
            println!("wrote {rows} rows to {}", out.display());
        }
        Commands::Reconcile => {
            let today = Utc::now().with_timezone(&cfg.publish.tz).date_naive();
            let report = reconcile(&ledger, provider, today)?;
            println!("{report}");
        }
        Commands::Predict { game_id } => {
            let resolver = resolver_for(&cfg, provider, cli.offline)?;
            let elo = load_elo(&cfg)?;
            let models = ModelRegistry::new(&cfg.model_dir, cfg.feature_order.clone());
            let builder = FeatureBuilder::new(provider, &resolver, elo.as_ref());
            let predictor = Predictor::new(provider, builder, &models, cfg.predict);
            let prediction = predictor.predict(game_id, &cfg.model)?;
            println!(
                "{} @ {}: {} (score {:.3} ± {:.3}, model {})",
                prediction.game.away.name,
                prediction.game.home.name,
                prediction.winner_name(),
                prediction.score,
                prediction.spread,
                prediction.model
            );
        }
        Commands::Cycle { wait } => {
            let resolver = resolver_for(&cfg, provider, cli.offline)?;
            let elo = load_elo(&cfg)?;
            let models = ModelRegistry::new(&cfg.model_dir, cfg.feature_order.clone());
            let odds: Box<dyn OddsSource> = if cfg.odds.enabled && !cli.offline {
                Box::new(TheOddsApi::new(cfg.odds.clone(), cfg.retry))
            } else {
                Box::new(NoOdds)
            };
            let cycle = DailyCycle {
                provider,
                resolver: &resolver,
                elo: elo.as_ref(),
                models: &models,
                model: &cfg.model,
                odds: odds.as_ref(),
                odds_tolerance_secs: cfg.odds.time_tolerance_secs,
                ledger: &ledger,
                predict: cfg.predict,
                window: cfg.publish,
            };

            let mut queue = PublishQueue::new();
            let report = cycle.run(Utc::now(), &mut queue)?;
            println!(
                "{}: {} predicted, {} requeued, {} skipped, {} jobs pending",
                report.date.map(|d| d.to_string()).unwrap_or_default(),
                report.predicted,
                report.requeued,
                report.skipped.len(),
                queue.len()
            );

            let publisher = LogPublisher;
            run_due(&mut queue, &publisher, &ledger, Utc::now())?;
            while wait && !queue.is_empty() {
                let Some(next) = queue.next_due() else {
                    break;
                };
                let delay = (next - Utc::now()).to_std().unwrap_or_default();
                if !delay.is_zero() {
                    info!(jobs = queue.len(), "next publish at {next}");
                    thread::sleep(delay);
                }
                let sent = run_due(&mut queue, &publisher, &ledger, Utc::now())?;
                if sent == 0 && queue.next_due().is_some_and(|at| at <= Utc::now()) {
                    warn!("publisher is failing; retrying in a minute");
                    thread::sleep(std::time::Duration::from_secs(60));
                }
            }
        }
    }
    Ok(())
}

fn resolver_for(cfg: &Config, provider: &dyn StatsProvider, offline: bool) -> Result<Resolver> {
    if offline {
        return Ok(Resolver::from_teams(provider.teams()?)?);
    }
    Ok(Resolver::load_or_build(&cfg.ids_cache_path, provider)?)
}

fn load_elo(cfg: &Config) -> Result<Option<EloTable>> {
    let Some(path) = &cfg.elo_table_path else {
        return Ok(None);
    };
    let table = EloTable::load(path)?;
    info!(rows = table.len(), path = %path.display(), "loaded ratings table");
    Ok(Some(table))
}
