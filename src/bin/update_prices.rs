// src/bin/update_prices.rs
//
// The entry point the external schedule invokes. Writes:
// - <DATA_DIR>/price.json
// - <DATA_DIR>/history.jsonl (one appended line per run)
// Exits non-zero on any failure so the invoker can alert and retry.
use dotenv::dotenv;

use gold_portfolio_feed::config::PipelineConfig;
use gold_portfolio_feed::services::pipeline;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = PipelineConfig::from_env();
    match pipeline::run(&config).await {
        Ok(snapshot) => {
            println!(
                "OK: {} primary {} check {}",
                snapshot.as_of.format("%Y-%m-%dT%H:%M:%SZ"),
                snapshot.primary.eur_per_oz,
                snapshot.check.eur_per_oz
            );
        }
        Err(e) => {
            eprintln!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}
