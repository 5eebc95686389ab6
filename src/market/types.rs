//! Core data types for the valuation pipeline
//! Pure data structures with no behavior

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Property categories accepted by the transaction-price API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyCategory {
    #[serde(rename = "宅地(土地)")]
    Land,
    #[serde(rename = "宅地(土地と建物)")]
    LandAndBuilding,
    #[serde(rename = "中古マンション等")]
    UsedCondominium,
    #[serde(rename = "農地")]
    Farmland,
    #[serde(rename = "林地")]
    ForestLand,
}

impl std::fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Same literal the upstream API uses as a query value
        match self {
            PropertyCategory::Land => write!(f, "宅地(土地)"),
            PropertyCategory::LandAndBuilding => write!(f, "宅地(土地と建物)"),
            PropertyCategory::UsedCondominium => write!(f, "中古マンション等"),
            PropertyCategory::Farmland => write!(f, "農地"),
            PropertyCategory::ForestLand => write!(f, "林地"),
        }
    }
}

/// Subject property under valuation
///
/// Invariants (enforced at the API boundary before the core runs):
/// price > 0, area > 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProperty {
    #[serde(rename = "propertyType")]
    pub category: PropertyCategory,
    /// Prefecture code, e.g. "13"
    pub prefecture: String,
    /// Municipality code, e.g. "13101"
    pub city: String,
    /// Asking/contract price in ten-thousand-yen units
    pub price: f64,
    /// Floor or land area in square meters
    pub area: f64,
    /// Building age in whole years
    pub age: u32,
}

/// One raw transaction row as returned by the upstream source.
///
/// Field names vary by API revision (English keys on newer payloads, Japanese
/// on older ones), so rows are kept as an opaque string map and read through
/// ordered alias lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RawTransaction(pub HashMap<String, String>);

impl RawTransaction {
    /// First present alias wins; absent fields are simply absent.
    pub fn field(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|k| self.0.get(*k)).map(String::as_str)
    }

    pub fn field_or_empty(&self, aliases: &[&str]) -> String {
        self.field(aliases).unwrap_or_default().to_string()
    }
}

/// A fiscal quarter, derived fresh per request and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub year: i32,
    /// 1-4
    pub quarter: u8,
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

/// A normalized historical transaction used as a market reference point
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparable {
    /// Unit price in ten-thousand-yen per square meter
    pub unit_price: f64,
    /// Building age in whole years (0 when unknown)
    pub age: u32,
    pub area: f64,
    /// Trade price in ten-thousand-yen units
    pub price: f64,
    pub district: String,
    pub period: String,
    #[serde(rename = "type")]
    pub category: String,
    pub municipality: String,
    pub floor_plan: String,
    pub structure: String,
    /// Building year as the source wrote it ("令和3年", "2020", ...)
    pub building_year: String,
    #[serde(rename = "use")]
    pub usage: String,
    pub purpose: String,
    pub direction: String,
    pub classification: String,
    pub breadth: String,
    pub total_floor_area: String,
    pub land_shape: String,
    pub front_road: String,
    pub remarks: String,
    pub renovation: String,
    pub coverage_ratio: String,
    pub floor_area_ratio: String,
    pub region: String,
    pub municipality_code: String,
    pub district_code: String,
    pub price_category: String,
}

/// Price-position ranks, cheapest-looking first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    S,
    A,
    B,
    C,
}

/// Display metadata for a rank badge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankInfo {
    pub rank: Rank,
    pub label: &'static str,
    pub color: &'static str,
    pub bg_color: &'static str,
    pub description: &'static str,
}

const RANK_S: RankInfo = RankInfo {
    rank: Rank::S,
    label: "Sランク",
    color: "#10B981",
    bg_color: "#ECFDF5",
    description: "非常に割安（買い推奨）",
};

const RANK_A: RankInfo = RankInfo {
    rank: Rank::A,
    label: "Aランク",
    color: "#3B82F6",
    bg_color: "#EFF6FF",
    description: "割安",
};

const RANK_B: RankInfo = RankInfo {
    rank: Rank::B,
    label: "Bランク",
    color: "#6B7280",
    bg_color: "#F9FAFB",
    description: "適正価格",
};

const RANK_C: RankInfo = RankInfo {
    rank: Rank::C,
    label: "Cランク",
    color: "#EF4444",
    bg_color: "#FEF2F2",
    description: "割高注意",
};

impl Rank {
    /// Fixed display metadata; never mutated at runtime
    pub fn info(self) -> &'static RankInfo {
        match self {
            Rank::S => &RANK_S,
            Rank::A => &RANK_A,
            Rank::B => &RANK_B,
            Rank::C => &RANK_C,
        }
    }
}

/// Full valuation output for one subject property
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    pub input: SubjectProperty,
    /// Subject unit price in ten-thousand-yen per square meter
    pub input_unit_price: f64,
    /// Market median unit price over the comparables
    pub market_median_unit_price: f64,
    /// Market average unit price over the comparables
    pub market_average_unit_price: f64,
    /// Percent deviation of the subject against the market median
    pub deviation_rate: f64,
    pub rank_info: &'static RankInfo,
    pub transactions: Vec<Comparable>,
    pub total_transaction_count: usize,
}

/// Municipality entry from the city-list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub code: String,
    pub name: String,
}
