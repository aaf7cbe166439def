use anyhow::Context;
use log::{error, info};
use wort_rs::api::CoordinatorClient;
use wort_rs::controller::{BrewOrchestrator, CancelToken};
use wort_rs::hardware::heater::GpioHeater;
use wort_rs::hardware::sensor::Ds18b20Probe;
use wort_rs::system::config::BrewConfig;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting brewing process controller");

    let config = BrewConfig::from_env();
    let cancel = CancelToken::new();

    let client =
        CoordinatorClient::new(&config).context("failed to build coordinator client")?;
    let heater = GpioHeater::new(config.heater_gpio)
        .with_context(|| format!("failed to set up heater on GPIO{}", config.heater_gpio))?;
    let probe = Ds18b20Probe::discover(&config.w1_devices_dir)
        .context("failed to locate temperature probe")?;

    let mut orchestrator = BrewOrchestrator::new(
        client,
        Box::new(heater),
        Box::new(probe),
        config,
        cancel,
    );

    // The orchestrator turns the heater off on every exit path before
    // returning, so there is nothing to clean up here.
    match orchestrator.run() {
        Ok(reason) => {
            info!("Brewing finished: {:?}", reason);
            Ok(())
        }
        Err(e) => {
            error!("Brewing aborted: {}", e);
            Err(e.into())
        }
    }
}
