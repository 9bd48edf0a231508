use lumera_server::GatewayServer;
use lumera_server::config::loader::load_config;
use lumera_server::observability;

#[tokio::main]
async fn main() {
    // Optional .env for local development; missing file is fine.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    let config_path = resolve_config_path();
    let cfg = match load_config(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    observability::init_tracing(&cfg.logging.level);
    tracing::info!(
        path = config_path.as_deref().unwrap_or("lumera.toml"),
        "configuration loaded"
    );

    let server = GatewayServer::new(&cfg);
    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}

/// `--config <path>` beats the `LUMERA_CONFIG` environment variable; with
/// neither, the loader falls back to `lumera.toml`.
fn resolve_config_path() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
    }
    std::env::var("LUMERA_CONFIG").ok()
}
