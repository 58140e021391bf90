mod cache;
mod config;
mod dashboard;
mod effects;
mod logging;
mod render;

fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env()?;
    logging::initialize(config.log_destination);
    dashboard::run(config)
}
