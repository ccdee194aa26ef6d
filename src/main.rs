use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use ferrite_recon::cli::{run_predict, run_train, Cli, Command};
use ferrite_recon::logging::init_tracing;

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Command::Train(args) => run_train(args).map(|summary| {
            println!("Best PSNR on the validation set: {}", summary.best_psnr);
        }),
        Command::Predict(args) => run_predict(args).map(|written| {
            for path in written.unwrap_or_default() {
                println!("{}", path.display());
            }
        }),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
