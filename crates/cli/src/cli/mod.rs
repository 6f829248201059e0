use std::path::PathBuf;

use clap::Parser;

use engine::RuntimeConfig;

mod logging;
mod serve;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (javascript runtime)");

/// Function runtime for a single microVM: accepts invocations over HTTP and
/// runs them one at a time.
#[derive(Debug, Parser)]
#[command(name = "impuls-runtime", version, long_version = LONG_VERSION)]
pub struct Args {
    /// Listen port [env: RUNTIME_PORT, default: 8080]
    #[arg(long)]
    pub port: Option<u16>,

    /// Listen address [env: RUNTIME_HOST, default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Directory function code is written to [env: FUNCTION_DIR, default: /var/task]
    #[arg(long)]
    pub function_dir: Option<PathBuf>,
}

impl Args {
    /// Flags win over the environment.
    pub fn apply(self, config: &mut RuntimeConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(function_dir) = self.function_dir {
            config.function_dir = function_dir;
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = RuntimeConfig::from_env();
    args.apply(&mut config);

    logging::init(&config.log_level);
    tracing::debug!("runtime config: {:?}", config);
    serve::run(config)
}
