use crate::cli::run;

pub mod cli;
mod config;
pub mod domain;
pub mod engine;
pub mod http;
pub mod provider;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    run()
}
