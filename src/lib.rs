pub mod assemble;
pub mod config;
pub mod cycle;
pub mod elo;
pub mod encode;
pub mod error;
pub mod fake_provider;
pub mod form;
pub mod fragment;
pub mod game;
pub mod http_client;
pub mod ids;
pub mod leaders;
pub mod ledger;
pub mod lgbm;
pub mod odds_fetch;
pub mod persist;
pub mod pitching;
pub mod predict;
pub mod publish;
pub mod reconcile;
pub mod retry;
pub mod schema;
pub mod standings;
pub mod stats_api;
