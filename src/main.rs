use log::{error, info};
use service::{config::Config, logging::Logger};

mod commands;
mod terminal;

fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
    }

    info!("Loading providers from [{}]", config.providers_file().display());

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = commands::run(&config, &mut stdout) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
