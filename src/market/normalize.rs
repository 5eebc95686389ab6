//! Record normalizer - turns raw transaction rows into comparable records
//! and derives the rolling quarter window to query

use crate::market::types::{Comparable, Period, RawTransaction};
use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// The source publishes roughly two quarters behind the calendar
const PUBLICATION_LAG_QUARTERS: u32 = 2;

// Era base years: era year N = base + N in the Western calendar
const REIWA_BASE: i32 = 2018;
const HEISEI_BASE: i32 = 1988;
const SHOWA_BASE: i32 = 1925;

// Ordered key aliases per logical field, first present wins.
// English keys appear on newer API revisions, Japanese on older ones.
const TRADE_PRICE_KEYS: &[&str] = &["TradePrice", "取引価格（総額）", "取引価格(総額)"];
const AREA_KEYS: &[&str] = &["Area", "面積（㎡）", "面積(㎡)"];
const BUILDING_YEAR_KEYS: &[&str] = &["BuildingYear", "建築年"];
const CATEGORY_KEYS: &[&str] = &["Type", "種類"];
const DISTRICT_KEYS: &[&str] = &["DistrictName", "地区名"];
const PERIOD_KEYS: &[&str] = &["Period", "取引時点", "取引時期"];
const MUNICIPALITY_KEYS: &[&str] = &["Municipality", "市区町村名"];
const FLOOR_PLAN_KEYS: &[&str] = &["FloorPlan", "間取り"];
const STRUCTURE_KEYS: &[&str] = &["Structure", "建物構造"];
const USE_KEYS: &[&str] = &["Use", "用途"];
const PURPOSE_KEYS: &[&str] = &["Purpose", "取引の目的"];
const DIRECTION_KEYS: &[&str] = &["Direction", "前面道路：方位"];
const CLASSIFICATION_KEYS: &[&str] = &["CityPlanning", "都市計画"];
const BREADTH_KEYS: &[&str] = &["Frontage", "間口"];
const TOTAL_FLOOR_AREA_KEYS: &[&str] = &["TotalFloorArea", "延床面積（㎡）", "延床面積(㎡)"];
const LAND_SHAPE_KEYS: &[&str] = &["LandShape", "土地の形状"];
const FRONT_ROAD_KEYS: &[&str] = &["Classification", "前面道路：種類"];
const REMARKS_KEYS: &[&str] = &["Remarks", "その他事項", "備考"];
const RENOVATION_KEYS: &[&str] = &["Renovation", "改装"];
const COVERAGE_RATIO_KEYS: &[&str] = &["CoverageRatio", "建ぺい率（％）", "建ぺい率"];
const FLOOR_AREA_RATIO_KEYS: &[&str] = &["FloorAreaRatio", "容積率（％）", "容積率"];
const REGION_KEYS: &[&str] = &["Region", "地域"];
const MUNICIPALITY_CODE_KEYS: &[&str] = &["MunicipalityCode", "市区町村コード"];
const DISTRICT_CODE_KEYS: &[&str] = &["DistrictCode", "地区コード"];
const PRICE_CATEGORY_KEYS: &[&str] = &["PriceCategory", "価格情報区分", "価格分類"];

/// Compute the rolling quarter window to query, most-recent-first,
/// starting from today's date.
pub fn quarter_window(count: usize) -> Vec<Period> {
    quarter_window_from(count, Local::now().date_naive())
}

/// Window derivation with an explicit reference date.
///
/// Steps back one quarter per entry (wrapping Q1 to Q4 of the previous
/// year), offset by the fixed publication lag before the first entry.
pub fn quarter_window_from(count: usize, today: NaiveDate) -> Vec<Period> {
    let mut year = today.year();
    let mut quarter = (today.month() + 2) / 3;

    for _ in 0..PUBLICATION_LAG_QUARTERS {
        step_back(&mut year, &mut quarter);
    }

    let mut periods = Vec::with_capacity(count);
    for _ in 0..count {
        periods.push(Period {
            year,
            quarter: quarter as u8,
        });
        step_back(&mut year, &mut quarter);
    }

    periods
}

fn step_back(year: &mut i32, quarter: &mut u32) {
    if *quarter == 1 {
        *quarter = 4;
        *year -= 1;
    } else {
        *quarter -= 1;
    }
}

/// Normalize one raw transaction row, or drop it.
///
/// Rows that cannot yield a positive price and area produce `None`; that is
/// the only rejection rule. Malformed numbers and missing fields degrade to
/// zero or empty rather than erroring.
pub fn normalize(raw: &RawTransaction, category_filter: Option<&str>) -> Option<Comparable> {
    normalize_at(raw, category_filter, Local::now().year())
}

/// Normalization with an explicit current year for the age arithmetic.
pub fn normalize_at(
    raw: &RawTransaction,
    category_filter: Option<&str>,
    current_year: i32,
) -> Option<Comparable> {
    let trade_price = parse_amount(raw.field(TRADE_PRICE_KEYS));
    let area = parse_amount(raw.field(AREA_KEYS));

    if trade_price <= 0.0 || area <= 0.0 {
        return None;
    }

    // Yen to ten-thousand-yen, then price per square meter
    let price = trade_price / 10_000.0;
    let unit_price = price / area;

    let category = raw.field_or_empty(CATEGORY_KEYS);
    if let Some(filter) = category_filter {
        // Rough filter only: the upstream query already scopes the rows, so
        // a category mismatch is noted but the record is still kept.
        let loose = filter.trim_end_matches('等');
        if !category.contains(loose) {
            debug!("keeping record with category {:?} despite filter {:?}", category, loose);
        }
    }

    let building_year = raw.field_or_empty(BUILDING_YEAR_KEYS);
    let age = building_age(&building_year, current_year);

    Some(Comparable {
        unit_price: round2(unit_price),
        age,
        area,
        price: round2(price),
        district: raw.field_or_empty(DISTRICT_KEYS),
        period: raw.field_or_empty(PERIOD_KEYS),
        category,
        municipality: raw.field_or_empty(MUNICIPALITY_KEYS),
        floor_plan: raw.field_or_empty(FLOOR_PLAN_KEYS),
        structure: raw.field_or_empty(STRUCTURE_KEYS),
        building_year,
        usage: raw.field_or_empty(USE_KEYS),
        purpose: raw.field_or_empty(PURPOSE_KEYS),
        direction: raw.field_or_empty(DIRECTION_KEYS),
        classification: raw.field_or_empty(CLASSIFICATION_KEYS),
        breadth: raw.field_or_empty(BREADTH_KEYS),
        total_floor_area: raw.field_or_empty(TOTAL_FLOOR_AREA_KEYS),
        land_shape: raw.field_or_empty(LAND_SHAPE_KEYS),
        front_road: raw.field_or_empty(FRONT_ROAD_KEYS),
        remarks: raw.field_or_empty(REMARKS_KEYS),
        renovation: raw.field_or_empty(RENOVATION_KEYS),
        coverage_ratio: raw.field_or_empty(COVERAGE_RATIO_KEYS),
        floor_area_ratio: raw.field_or_empty(FLOOR_AREA_RATIO_KEYS),
        region: raw.field_or_empty(REGION_KEYS),
        municipality_code: raw.field_or_empty(MUNICIPALITY_CODE_KEYS),
        district_code: raw.field_or_empty(DISTRICT_CODE_KEYS),
        price_category: raw.field_or_empty(PRICE_CATEGORY_KEYS),
    })
}

/// Parse a numeric amount, stripping thousands separators.
/// Absent or malformed values become 0 and fall to the rejection rule.
fn parse_amount(value: Option<&str>) -> f64 {
    value
        .map(|v| v.replace(',', ""))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Building age in whole years from a building-year string.
///
/// A 4-digit Western year wins; otherwise era notations are tried in order
/// (令和, 平成, 昭和). Unrecognized strings give age 0, and a building year
/// in the future clamps to 0.
fn building_age(building_year: &str, current_year: i32) -> u32 {
    static WESTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").unwrap());
    static REIWA: Lazy<Regex> = Lazy::new(|| Regex::new(r"令和(\d+)").unwrap());
    static HEISEI: Lazy<Regex> = Lazy::new(|| Regex::new(r"平成(\d+)").unwrap());
    static SHOWA: Lazy<Regex> = Lazy::new(|| Regex::new(r"昭和(\d+)").unwrap());

    let built = if let Some(caps) = WESTERN.captures(building_year) {
        caps[1].parse::<i32>().ok()
    } else if let Some(caps) = REIWA.captures(building_year) {
        caps[1].parse::<i32>().ok().map(|n| REIWA_BASE + n)
    } else if let Some(caps) = HEISEI.captures(building_year) {
        caps[1].parse::<i32>().ok().map(|n| HEISEI_BASE + n)
    } else if let Some(caps) = SHOWA.captures(building_year) {
        caps[1].parse::<i32>().ok().map(|n| SHOWA_BASE + n)
    } else {
        None
    };

    match built {
        Some(year) => (current_year - year).max(0) as u32,
        None => 0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
