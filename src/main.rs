use clap::Parser;
use log::{error, info};
use viewcap::configuration::cli::CliArgs;
use viewcap::configuration::config::Config;
use viewcap::controller::controller_handler::Controller;

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level, e.g. RUST_LOG=viewcap=debug
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
        viewcap v{} - headless front/back view capture service
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    let args = CliArgs::parse();

    let mut config = match args.config_file {
        Some(ref path) => {
            info!("Importing configuration from {}", path.display());
            Config::from_file(path).unwrap_or_else(|e| {
                error!("Unable to import configuration from file: {}", e);
                std::process::exit(1);
            })
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };
    config.apply_overrides(&args.overrides());

    let controller = Controller::new(config).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
