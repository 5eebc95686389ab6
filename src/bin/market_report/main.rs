//! One-shot market valuation from the command line - window, fetch, evaluate

use anyhow::{anyhow, Result};
use std::env;
use std::time::Duration;
use tracing::{info, warn};
use valuation_backend::market::analysis::evaluate;
use valuation_backend::market::fetch::{MarketQuery, ReinfolibClient};
use valuation_backend::market::normalize::quarter_window;
use valuation_backend::market::types::{PropertyCategory, SubjectProperty};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env();

    let args: Vec<String> = env::args().collect();
    if args.len() < 7 {
        return Err(anyhow!(
            "usage: market-report <prefecture> <city> <category> <price 万円> <area ㎡> <age>"
        ));
    }

    let category = parse_category(&args[3])?;
    let subject = SubjectProperty {
        category,
        prefecture: args[1].clone(),
        city: args[2].clone(),
        price: args[4].parse()?,
        area: args[5].parse()?,
        age: args[6].parse()?,
    };
    if subject.price <= 0.0 || subject.area <= 0.0 {
        return Err(anyhow!("price and area must be positive"));
    }

    info!(
        "Starting valuation for {} in {}-{}",
        subject.category, subject.prefecture, subject.city
    );

    // Step 1: Derive the quarter window
    info!("Step 1/3: Deriving quarter window...");
    let window = quarter_window(config.quarter_count);
    info!(
        "✓ {} quarters, {} back to {}",
        window.len(),
        window[0],
        window[window.len() - 1]
    );

    // Step 2: Fetch and normalize comparables
    info!("Step 2/3: Fetching comparables...");
    let client = ReinfolibClient::new(&config.gateway_url, Duration::from_secs(config.timeout_secs))?;
    let query = MarketQuery {
        area: subject.prefecture.clone(),
        city: subject.city.clone(),
        category: Some(category),
    };
    let comparables = client.fetch_comparables(&query, &window).await;

    if comparables.is_empty() {
        warn!("✗ No transaction data found for this area and category");
        return Ok(());
    }
    info!("✓ {} comparables", comparables.len());

    // Step 3: Evaluate against the market
    info!("Step 3/3: Evaluating...");
    let result = evaluate(&subject, comparables);
    let rank = result.rank_info;

    info!("✓ Evaluation complete");
    info!("Subject unit price:  {} 万円/㎡", result.input_unit_price);
    info!(
        "Market median:       {} 万円/㎡ (average {})",
        result.market_median_unit_price, result.market_average_unit_price
    );
    info!("Deviation:           {}%", result.deviation_rate);
    info!(
        "{}: {} ({} comparables)",
        rank.label, rank.description, result.total_transaction_count
    );

    Ok(())
}

fn parse_category(value: &str) -> Result<PropertyCategory> {
    match value {
        "宅地(土地)" | "land" => Ok(PropertyCategory::Land),
        "宅地(土地と建物)" | "land-building" => Ok(PropertyCategory::LandAndBuilding),
        "中古マンション等" | "condo" => Ok(PropertyCategory::UsedCondominium),
        "農地" | "farmland" => Ok(PropertyCategory::Farmland),
        "林地" | "forest" => Ok(PropertyCategory::ForestLand),
        other => Err(anyhow!("unknown property category: {}", other)),
    }
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
struct Config {
    gateway_url: String,
    quarter_count: usize,
    timeout_secs: u64,
}

impl Config {
    fn from_env() -> Self {
        Config {
            gateway_url: env::var("REINFOLIB_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8787/reinfolib".to_string()),

            quarter_count: env::var("QUARTER_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8)
                .max(1),

            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(
            parse_category("中古マンション等").unwrap(),
            PropertyCategory::UsedCondominium
        );
        assert_eq!(parse_category("condo").unwrap(), PropertyCategory::UsedCondominium);
        assert_eq!(parse_category("宅地(土地)").unwrap(), PropertyCategory::Land);
        assert!(parse_category("castle").is_err());
    }
}
