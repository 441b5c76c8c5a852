use clap::Parser;
use oas_emulator::config::Config;
use oas_emulator::EmulatorServer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "oas-emulator")]
struct Args {
    /// Override SERVER_PORT
    #[arg(short, long)]
    port: Option<u16>,
    /// Override SPEC_PATH
    #[arg(long)]
    spec: Option<String>,
    /// Override SAMPLES_DIR
    #[arg(long)]
    samples: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}

fn log_level(cfg: &Config, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    match cfg.log_level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let mut cfg = Config::from_env();
    if let Some(port) = args.port {
        cfg.server_port = port;
    }
    if let Some(spec) = args.spec {
        cfg.spec_path = spec;
    }
    if let Some(samples) = args.samples {
        cfg.samples_dir = samples;
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&cfg, args.verbose))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("starting emulator on port {}", cfg.server_port);

    let debug_routes = cfg.debug_routes;
    let server = EmulatorServer::new(cfg)?;
    if debug_routes {
        info!("routes:\n{}", server.debug_routes());
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
