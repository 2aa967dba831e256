use std::path::PathBuf;
use std::sync::Arc;

use rampart::config::Config;
use rampart::logger::Logger;
use rampart::server::Server;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    // First argument names the config file; without it, `rampart.yaml` is
    // used when present and built-in defaults otherwise.
    let config_path = std::env::args().nth(1).map(PathBuf::from).or_else(|| {
        let default = PathBuf::from("rampart.yaml");
        default.exists().then_some(default)
    });
    let config = Arc::new(Config::load_or_default(config_path.as_deref())?);

    let logger = Logger::open(&config.log_config())?;
    let mut server = Server::bind(Arc::clone(&config), logger.clone())?;

    let result = server.run();
    server.shutdown();
    logger.shutdown();
    result
}
