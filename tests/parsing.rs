use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, TimeZone, Utc};

use mlb_oracle::elo::EloTable;
use mlb_oracle::game::{GameStatus, Side};
use mlb_oracle::odds_fetch::parse_odds_json;
use mlb_oracle::pitching::season_line;
use mlb_oracle::stats_api::{
    LeaderCategory, parse_boxscore_json, parse_career_pitching_json, parse_leaders_json,
    parse_pitching_json, parse_schedule_json, parse_standings_json, parse_teams_json,
};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

#[test]
fn parses_schedule_fixture() {
    let games = parse_schedule_json(&read_fixture("schedule.json")).expect("fixture should parse");
    assert_eq!(games.len(), 2);

    let done = &games[0];
    assert_eq!(done.game_id, 745001);
    assert_eq!(done.status, GameStatus::Final);
    assert_eq!(done.winner_side(), Some(Side::Away));
    assert_eq!(done.winning_team(), Some("Boston Red Sox"));
    assert_eq!(done.winning_pitcher.as_deref(), Some("Brayan Bello"));
    assert_eq!(done.national_broadcasts, vec!["FOX".to_string()]);
    assert_eq!(done.venue.as_deref(), Some("Yankee Stadium"));
    assert_eq!(
        done.datetime,
        Some(Utc.with_ymd_and_hms(2024, 6, 1, 17, 5, 0).unwrap())
    );

    let upcoming = &games[1];
    assert_eq!(upcoming.status, GameStatus::Scheduled);
    assert_eq!(upcoming.home_probable.as_deref(), Some("Kodai Senga"));
    assert_eq!(upcoming.away_probable.as_deref(), Some("Jesus Luzardo"));
    assert_eq!(upcoming.winner_side(), None);
}

#[test]
fn empty_schedule_is_no_games() {
    assert!(parse_schedule_json(r#"{"dates": []}"#).unwrap().is_empty());
    assert!(parse_schedule_json("{}").unwrap().is_empty());
}

#[test]
fn parses_boxscore_for_either_side() {
    let raw = read_fixture("boxscore.json");
    let bos = parse_boxscore_json(&raw, 111).expect("away side");
    assert_eq!(bos.runs, Some(4.0));
    assert_eq!(bos.ops, Some(0.742));
    assert_eq!(bos.strikeouts, Some(11.0));

    let nyy = parse_boxscore_json(&raw, 147).expect("home side");
    assert_eq!(nyy.runs_allowed, Some(4.0));
    assert_eq!(nyy.obp_allowed, None);

    let err = parse_boxscore_json(&raw, 121).unwrap_err();
    assert!(!err.is_transient());
}

#[test]
fn parses_standings_and_drops_duplicate_rows() {
    let as_of = date("2024-06-01");
    let snapshots =
        parse_standings_json(&read_fixture("standings.json"), as_of).expect("fixture should parse");
    assert_eq!(snapshots.len(), 2);

    let east = &snapshots[0];
    assert_eq!(east.division_id, 201);
    assert_eq!(east.teams.len(), 2);
    let bos = east.record("Boston Red Sox").unwrap();
    assert_eq!((bos.wins, bos.losses), (45, 45));
    assert_eq!(bos.games_back, "5.0");
    assert_eq!(bos.division_rank, Some(2));
    assert_eq!(east.record("New York Yankees").unwrap().win_percentage(), Some(0.556));

    let mets = snapshots[1].record("New York Mets").unwrap();
    assert_eq!(mets.win_percentage(), None);
    assert_eq!(mets.league_rank, None);
}

#[test]
fn parses_pitching_splits_latest_wins() {
    let seasons = parse_pitching_json(&read_fixture("pitching.json")).expect("fixture should parse");
    assert_eq!(seasons.len(), 3);
    let line = season_line(&seasons, 2024).unwrap();
    assert_eq!(line.era, Some(2.10));
    assert_eq!(line.runs_per9, Some(2.40));
    assert!(season_line(&seasons, 2022).is_none());

    let career = parse_career_pitching_json(&read_fixture("career.json"))
        .expect("fixture should parse")
        .expect("career line present");
    assert_eq!(career.whip, Some(1.08));
    assert_eq!(parse_career_pitching_json(r#"{"stats": []}"#).unwrap(), None);
}

#[test]
fn parses_leaders_in_rank_order() {
    let raw = read_fixture("leaders.json");
    let hr = parse_leaders_json(&raw, LeaderCategory::HomeRuns).expect("fixture should parse");
    assert_eq!(hr, vec![24.0, 18.0, 15.0, 11.0, 9.0, 7.0]);
    let avg = parse_leaders_json(&raw, LeaderCategory::BattingAverage).unwrap();
    assert_eq!(avg.len(), 3);
    assert!(parse_leaders_json(&raw, LeaderCategory::StolenBases).unwrap().is_empty());
}

#[test]
fn parses_active_teams_only() {
    let teams = parse_teams_json(&read_fixture("teams.json")).expect("fixture should parse");
    assert_eq!(teams.len(), 4);
    let bos = teams.iter().find(|t| t.id == 111).unwrap();
    assert_eq!(bos.abbreviation, "BOS");
    assert_eq!(bos.division_id, Some(201));
    assert_eq!(bos.league.as_deref(), Some("American League"));
}

#[test]
fn parses_odds_best_price_and_favorite() {
    let retrieved = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let snapshot = parse_odds_json(&read_fixture("odds.json"), retrieved).expect("fixture should parse");
    assert_eq!(snapshot.games.len(), 2);

    let game = &snapshot.games[0];
    let away = game.away.as_ref().unwrap();
    assert_eq!(away.price, 135);
    assert_eq!(away.bookmaker, "FanDuel");
    let home = game.home.as_ref().unwrap();
    assert_eq!(home.price, -155);
    assert_eq!(home.bookmaker, "DraftKings");
    assert_eq!(game.favorite.as_deref(), Some("New York Yankees"));

    let empty = &snapshot.games[1];
    assert!(empty.home.is_none() && empty.away.is_none());
    assert!(empty.favorite.is_none());
}

#[test]
fn loads_ratings_table_keeping_first_doubleheader_row() {
    let table = EloTable::load(&fixture_path("elo.csv")).expect("fixture should load");
    assert_eq!(table.len(), 2);
    let row = table.lookup(date("2024-06-01"), "nyy", "BOS").unwrap();
    assert_eq!(row.home_elo, 1545.2);
    assert_eq!(row.home_prob, 0.582);

    let derived = table.lookup(date("2024-06-01"), "NYM", "FLA").unwrap();
    assert!(derived.home_prob > 0.5 && derived.home_prob < 1.0);
    assert!(table.lookup(date("2024-06-02"), "NYY", "BOS").is_none());
}
