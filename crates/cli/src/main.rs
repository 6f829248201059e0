mod cli;

fn main() {
    if let Err(err) = cli::run() {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}
