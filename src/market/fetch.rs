//! Upstream client - retrieves raw transaction rows from the
//! transaction-price gateway, one request per quarter

use crate::market::normalize;
use crate::market::types::{City, Comparable, Period, PropertyCategory, RawTransaction};
use anyhow::{anyhow, Result};
use chrono::{Datelike, Local};
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Classification code for transaction-price records (as opposed to
/// assessed-value records)
const PRICE_CLASSIFICATION: &str = "01";

/// Query scope for comparable transactions
#[derive(Debug, Clone)]
pub struct MarketQuery {
    /// Prefecture code, e.g. "13"
    pub area: String,
    /// Municipality code, e.g. "13101"
    pub city: String,
    pub category: Option<PropertyCategory>,
}

/// The gateway answers either `{"data": [...]}` or a bare array depending
/// on revision; both are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Envelope<T> {
    fn into_rows(self) -> Vec<T> {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(rows) => rows,
        }
    }
}

/// City-list rows carry the municipality code as `id` or `code`
#[derive(Debug, Deserialize)]
struct CityRow {
    id: Option<String>,
    code: Option<String>,
    name: Option<String>,
}

/// Thin JSON client for the transaction-price gateway.
///
/// No retry or backoff: a failed period is reported to the caller and the
/// valuation proceeds with whatever the other periods returned.
pub struct ReinfolibClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReinfolibClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Municipality list for a prefecture.
    pub async fn city_list(&self, area: &str) -> Result<Vec<City>> {
        let url = format!("{}/cities", self.base_url);
        let response = self.http.get(&url).query(&[("area", area)]).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("city list request failed: {}", status));
        }

        let envelope: Envelope<CityRow> = response.json().await?;
        let cities = envelope
            .into_rows()
            .into_iter()
            .map(|row| City {
                code: row.id.or(row.code).unwrap_or_default(),
                name: row.name.unwrap_or_default(),
            })
            .collect();

        Ok(cities)
    }

    /// Raw transaction rows for one quarter.
    pub async fn transactions_for_period(
        &self,
        query: &MarketQuery,
        period: Period,
    ) -> Result<Vec<RawTransaction>> {
        let url = format!("{}/transactions", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("year", period.year.to_string()),
                ("quarter", period.quarter.to_string()),
                ("area", query.area.clone()),
                ("city", query.city.clone()),
                ("priceClassification", PRICE_CLASSIFICATION.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("transaction request for {} failed: {}", period, status));
        }

        let envelope: Envelope<RawTransaction> = response.json().await?;
        Ok(envelope.into_rows())
    }

    /// Fetch and normalize comparables across the quarter window.
    ///
    /// Periods are queried concurrently; a failed or malformed period is
    /// logged and skipped, partial data is normal operation. Zero
    /// comparables is a valid outcome the caller must handle.
    pub async fn fetch_comparables(
        &self,
        query: &MarketQuery,
        window: &[Period],
    ) -> Vec<Comparable> {
        let current_year = Local::now().year();
        let filter = query.category.map(|c| c.to_string());

        let results = join_all(window.iter().copied().map(|period| async move {
            (period, self.transactions_for_period(query, period).await)
        }))
        .await;

        let mut comparables = Vec::new();
        for (period, result) in results {
            match result {
                Ok(rows) => {
                    let before = comparables.len();
                    comparables.extend(
                        rows.iter()
                            .filter_map(|raw| normalize::normalize_at(raw, filter.as_deref(), current_year)),
                    );
                    info!(
                        "{}: {} rows fetched, {} comparables kept",
                        period,
                        rows.len(),
                        comparables.len() - before
                    );
                }
                Err(e) => {
                    warn!("Skipping {}: {}", period, e);
                }
            }
        }

        comparables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wrapped_and_bare() {
        let wrapped: Envelope<RawTransaction> =
            serde_json::from_str(r#"{"data": [{"TradePrice": "25,000,000", "Area": "50"}]}"#)
                .unwrap();
        let rows = wrapped.into_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field(&["TradePrice"]), Some("25,000,000"));

        let bare: Envelope<RawTransaction> =
            serde_json::from_str(r#"[{"Area": "50"}, {"Area": "60"}]"#).unwrap();
        assert_eq!(bare.into_rows().len(), 2);
    }

    #[test]
    fn test_city_row_code_fallback() {
        let envelope: Envelope<CityRow> = serde_json::from_str(
            r#"{"data": [{"id": "13101", "name": "千代田区"}, {"code": "13102", "name": "中央区"}]}"#,
        )
        .unwrap();

        let cities: Vec<City> = envelope
            .into_rows()
            .into_iter()
            .map(|row| City {
                code: row.id.or(row.code).unwrap_or_default(),
                name: row.name.unwrap_or_default(),
            })
            .collect();

        assert_eq!(cities[0].code, "13101");
        assert_eq!(cities[0].name, "千代田区");
        assert_eq!(cities[1].code, "13102");
    }

    #[tokio::test]
    #[ignore] // Ignore by default since it needs a running gateway
    async fn test_city_list_live() {
        let client =
            ReinfolibClient::new("http://localhost:8787/reinfolib", Duration::from_secs(10))
                .unwrap();

        let cities = client.city_list("13").await.unwrap();
        assert!(!cities.is_empty());
    }
}
