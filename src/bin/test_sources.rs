// src/bin/test_sources.rs
use gold_portfolio_feed::services::{ecb, http, stooq};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let client = http::build_client()?;
    println!(
        "XAUEUR quote: {:?}",
        stooq::fetch_quote(&client, stooq::PRIMARY_SYMBOL).await?
    );
    println!(
        "XAUUSD quote: {:?}",
        stooq::fetch_quote(&client, stooq::CHECK_SYMBOL).await?
    );
    println!(
        "ECB USD/EUR:  {:?}",
        ecb::fetch_rate(&client, "EUR", "USD").await?
    );
    Ok(())
}
