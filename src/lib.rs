pub mod api;
pub mod cache;
pub mod classify;
pub mod config;
pub mod ingest;
pub mod init;
pub mod ledger;
pub mod model;
pub mod pipeline;
pub mod select;
pub mod show;
pub mod volatility;
