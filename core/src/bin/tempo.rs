/// Tempo CLI
///
/// Validates workflow resources and runs them through an in-process broker.
use tempo_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
