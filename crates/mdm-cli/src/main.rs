use mdm_core::logging;

mod cli;

fn main() {
    // The console owns the terminal; logs go to the state file when possible.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
    }

    if let Err(err) = cli::run_from_args() {
        eprintln!("mdm error: {:#}", err);
        std::process::exit(1);
    }
}
