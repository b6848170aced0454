use dotenv::dotenv;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;

use gold_portfolio_feed::config::GatewayConfig;
use gold_portfolio_feed::handlers::gateway::Gateway;
use gold_portfolio_feed::routes;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the gateway...");

    let config = GatewayConfig::from_env();
    info!(
        "Fronting {} with cache generation {}",
        config.upstream_origin, config.cache_version
    );

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();

    let gateway = match Gateway::new(&config) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!("Could not build the gateway: {}", e);
            std::process::exit(1);
        }
    };

    // Populate the new generation and purge the old ones before the first
    // request is answered
    gateway.start().await;

    let api = routes::routes(gateway);
    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
}
