pub mod activity;
pub mod audit;
pub mod config;
