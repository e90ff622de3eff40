pub mod api;
pub mod cli;
pub mod config;
pub mod runner;
pub mod transcript;
pub mod wallet;
