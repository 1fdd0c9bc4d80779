//! gitgate binary entry point.

fn main() {
    if let Err(err) = gitgate::cli::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
