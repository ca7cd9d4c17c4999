//! kmatrix CLI entry point

fn main() {
    // Logging is initialized inside `run()` once `--log-level` has been parsed.
    kmatrix::cli::run();
}
