use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use mlb_oracle::config::Config;
use mlb_oracle::predict::{LoadedModel, score_record, winner_for};
use mlb_oracle::schema::FeatureRecord;

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env");
    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/feature_record.json"));
    let cfg = Config::from_env();
    let model_name = args.next().unwrap_or(cfg.model.clone());
    let model_dir = args.next().map(PathBuf::from).unwrap_or(cfg.model_dir.clone());

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let record: FeatureRecord =
        serde_json::from_str(&raw).with_context(|| format!("decode {}", path.display()))?;

    // One stored record through the model, no network.
    let model = LoadedModel::load(&model_dir, &model_name, cfg.feature_order.as_deref())?;
    let (score, spread) = score_record(&model, &record, &cfg.predict)?;
    let winner = match winner_for(score) {
        mlb_oracle::game::Side::Home => &record.home_team,
        mlb_oracle::game::Side::Away => &record.away_team,
    };

    println!("Game:   {} ({})", record.game_id, record.date);
    println!("Match:  {} @ {}", record.away_team, record.home_team);
    println!("Model:  {model_name} ({} columns)", model.schema.len());
    println!("Nulls:  {}", record.null_count());
    println!("Score:  {score:.4} ± {spread:.4}");
    println!("Pick:   {winner}");
    if let Some(home_won) = record.did_home_win {
        let actual = if home_won { &record.home_team } else { &record.away_team };
        println!("Actual: {actual} ({})", if actual == winner { "hit" } else { "miss" });
    }
    Ok(())
}
