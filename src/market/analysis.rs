//! Valuation engine - market statistics, deviation rate and rank assignment

use crate::market::types::{Comparable, Rank, SubjectProperty, ValuationResult};

/// Median of a value sequence; 0 for an empty input.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Unit prices that qualify for market statistics: finite and positive.
/// The normalizer already guarantees positivity, this filter is a backstop.
fn qualifying_unit_prices(comparables: &[Comparable]) -> Vec<f64> {
    comparables
        .iter()
        .map(|c| c.unit_price)
        .filter(|p| *p > 0.0 && p.is_finite())
        .collect()
}

/// Market median unit price over the comparable set.
pub fn market_median_unit_price(comparables: &[Comparable]) -> f64 {
    median(&qualifying_unit_prices(comparables))
}

/// Market average unit price over the comparable set; 0 when nothing qualifies.
pub fn market_average_unit_price(comparables: &[Comparable]) -> f64 {
    let prices = qualifying_unit_prices(comparables);
    if prices.is_empty() {
        return 0.0;
    }
    prices.iter().sum::<f64>() / prices.len() as f64
}

/// Percent deviation of the subject unit price against the market.
/// A zero market price gives 0 rather than dividing by zero.
pub fn deviation_rate(subject_unit_price: f64, market_unit_price: f64) -> f64 {
    if market_unit_price == 0.0 {
        return 0.0;
    }
    (subject_unit_price - market_unit_price) / market_unit_price * 100.0
}

/// Deviation-rate bands: at or below -10% is S, -5% is A, +5% is B,
/// anything above is C.
pub fn classify_rank(deviation_rate: f64) -> Rank {
    if deviation_rate <= -10.0 {
        Rank::S
    } else if deviation_rate <= -5.0 {
        Rank::A
    } else if deviation_rate <= 5.0 {
        Rank::B
    } else {
        Rank::C
    }
}

/// Evaluate a subject property against its comparable set.
///
/// The deviation is computed against the market **median**; the average is
/// reported alongside for display. Output figures are rounded to two
/// decimals only at the edge, the deviation itself is computed on the
/// unrounded unit price.
pub fn evaluate(subject: &SubjectProperty, comparables: Vec<Comparable>) -> ValuationResult {
    assert!(
        subject.price > 0.0 && subject.area > 0.0,
        "subject property must have positive price and area"
    );

    let subject_unit_price = subject.price / subject.area;

    let market_median = market_median_unit_price(&comparables);
    let market_average = market_average_unit_price(&comparables);
    let deviation = deviation_rate(subject_unit_price, market_median);
    let rank = classify_rank(deviation);

    let total = comparables.len();
    ValuationResult {
        input: subject.clone(),
        input_unit_price: round2(subject_unit_price),
        market_median_unit_price: round2(market_median),
        market_average_unit_price: round2(market_average),
        deviation_rate: round2(deviation),
        rank_info: rank.info(),
        transactions: comparables,
        total_transaction_count: total,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::PropertyCategory;

    fn comps(unit_prices: &[f64]) -> Vec<Comparable> {
        unit_prices
            .iter()
            .map(|p| Comparable {
                unit_price: *p,
                area: 50.0,
                price: p * 50.0,
                ..Default::default()
            })
            .collect()
    }

    fn subject(price: f64, area: f64) -> SubjectProperty {
        SubjectProperty {
            category: PropertyCategory::UsedCondominium,
            prefecture: "13".to_string(),
            city: "13101".to_string(),
            price,
            area,
            age: 10,
        }
    }

    #[test]
    fn test_median_edge_cases() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[7.0]), 7.0);
        assert_eq!(median(&[1.0, 3.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0); // unsorted input
    }

    #[test]
    fn test_average_lies_between_min_and_max() {
        let prices = [40.0, 45.0, 50.0, 55.0, 200.0];
        let average = market_average_unit_price(&comps(&prices));

        assert!(average >= 40.0 && average <= 200.0);
        assert_eq!(average, 78.0);
    }

    #[test]
    fn test_market_statistics_exclude_degenerate_entries() {
        let mut comparables = comps(&[50.0]);
        comparables.push(Comparable {
            unit_price: 0.0,
            ..Default::default()
        });
        comparables.push(Comparable {
            unit_price: -3.0,
            ..Default::default()
        });
        comparables.push(Comparable {
            unit_price: f64::INFINITY,
            ..Default::default()
        });

        assert_eq!(market_median_unit_price(&comparables), 50.0);
        assert_eq!(market_average_unit_price(&comparables), 50.0);
    }

    #[test]
    fn test_average_of_empty_market_is_zero() {
        assert_eq!(market_average_unit_price(&[]), 0.0);
        assert_eq!(market_median_unit_price(&[]), 0.0);
    }

    #[test]
    fn test_deviation_rate_zero_market() {
        // Degenerate market never divides by zero
        assert_eq!(deviation_rate(50.0, 0.0), 0.0);
        assert_eq!(deviation_rate(-3.0, 0.0), 0.0);
        assert_eq!(deviation_rate(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_deviation_rate() {
        assert_eq!(deviation_rate(45.0, 50.0), -10.0);
        assert_eq!(deviation_rate(55.0, 50.0), 10.0);
        assert_eq!(deviation_rate(50.0, 50.0), 0.0);
    }

    #[test]
    fn test_rank_boundaries() {
        assert_eq!(classify_rank(-10.0), Rank::S);
        assert_eq!(classify_rank(-9.999), Rank::A);
        assert_eq!(classify_rank(-5.0), Rank::A);
        assert_eq!(classify_rank(-4.999), Rank::B);
        assert_eq!(classify_rank(5.0), Rank::B);
        assert_eq!(classify_rank(5.001), Rank::C);
        assert_eq!(classify_rank(-25.0), Rank::S);
        assert_eq!(classify_rank(40.0), Rank::C);
    }

    #[test]
    fn test_rank_metadata_table() {
        assert_eq!(Rank::S.info().label, "Sランク");
        assert_eq!(Rank::S.info().color, "#10B981");
        assert_eq!(Rank::B.info().description, "適正価格");
        assert_eq!(Rank::C.info().bg_color, "#FEF2F2");
    }

    #[test]
    fn test_evaluate_against_median() {
        // 3000万円 / 60㎡ = 50万円/㎡, dead on the market median
        let result = evaluate(&subject(3000.0, 60.0), comps(&[40.0, 45.0, 50.0, 55.0, 200.0]));

        assert_eq!(result.input_unit_price, 50.0);
        assert_eq!(result.market_median_unit_price, 50.0);
        assert_eq!(result.market_average_unit_price, 78.0);
        assert_eq!(result.deviation_rate, 0.0);
        assert_eq!(result.rank_info.rank, Rank::B);
        assert_eq!(result.total_transaction_count, 5);
        assert_eq!(result.transactions.len(), 5);

        // Against the outlier-dragged average the same subject would rank S;
        // the median is the reference statistic.
        let vs_average = deviation_rate(50.0, 78.0);
        assert!(vs_average < -35.0 && vs_average > -36.0);
        assert_eq!(classify_rank(vs_average), Rank::S);
    }

    #[test]
    fn test_evaluate_empty_market_is_deterministic() {
        let result = evaluate(&subject(3000.0, 60.0), Vec::new());

        assert_eq!(result.market_median_unit_price, 0.0);
        assert_eq!(result.market_average_unit_price, 0.0);
        assert_eq!(result.deviation_rate, 0.0);
        assert_eq!(result.rank_info.rank, Rank::B);
        assert_eq!(result.total_transaction_count, 0);
    }

    #[test]
    fn test_evaluate_rounds_output_only() {
        // 1000万円 / 33㎡ = 30.3030..; deviation computed unrounded, then
        // both figures rounded for output
        let result = evaluate(&subject(1000.0, 33.0), comps(&[30.0]));

        assert_eq!(result.input_unit_price, 30.3);
        assert_eq!(result.market_median_unit_price, 30.0);
        assert_eq!(result.deviation_rate, 1.01); // (30.3030 - 30) / 30 * 100
        assert_eq!(result.rank_info.rank, Rank::B);
    }

    #[test]
    #[should_panic(expected = "positive price and area")]
    fn test_evaluate_rejects_nonpositive_subject() {
        evaluate(&subject(3000.0, 0.0), Vec::new());
    }
}
