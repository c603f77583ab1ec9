// src/main.rs

use devloop::errors::DevloopError;
use devloop::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.global.log_level) {
        eprintln!("devloop error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(exit) => std::process::exit(exit.code()),
        // Already reported by the loop.
        Err(DevloopError::FirstBuildFailed) => std::process::exit(1),
        Err(err) => {
            eprintln!("devloop error: {err:?}");
            std::process::exit(1);
        }
    }
}
