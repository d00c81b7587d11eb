use clap::Parser;
use std::sync::Arc;

use ota_image_server::config::{self, AppState, Config};
use ota_image_server::error::ServerError;
use ota_image_server::{logger, server};

/// Serve a firmware image for over-the-air updates
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (extension optional; missing file means defaults)
    #[arg(short, long, default_value = "config")]
    config: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = Config::load_from(&args.config).map_err(ServerError::Config)?;
    logger::init(&cfg).map_err(ServerError::Logger)?;

    // Create Tokio runtime, sizing worker threads from config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))?;
    Ok(())
}

async fn async_main(cfg: Config) -> Result<(), ServerError> {
    let addr = cfg.get_socket_addr()?;
    let image = cfg.image_source(&config::application_dir()?);
    let listener = server::create_listener(addr)?;

    logger::log_server_start(&addr, &cfg, &image);

    let state = Arc::new(AppState::new(cfg, image));
    server::start_signal_handler(Arc::clone(&state));
    server::serve(listener, state).await;
    Ok(())
}
