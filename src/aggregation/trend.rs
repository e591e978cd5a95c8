//! Trend indicators: signed percentage change against a prior period.

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use super::bucket::PeriodTotals;
use crate::models::{Currency, CurrencyBucket, Metric, Trend, TrendIndicator};

/// Percentage change from `previous` to `current`.
///
/// A zero baseline yields `+100%` when there is something now and `0%`
/// otherwise. Otherwise the change is rounded to one decimal place and
/// non-negative values carry a `+`.
pub fn trend_indicator(current: Decimal, previous: Decimal) -> TrendIndicator {
    if previous.is_zero() {
        let label = if current > Decimal::ZERO { "+100%" } else { "0%" };
        return TrendIndicator::from_label(label.to_string());
    }

    let Some(mut change) = current
        .checked_sub(previous)
        .and_then(|delta| delta.checked_div(previous))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
    else {
        debug!("Trend {} vs {} overflowed, saturating", current, previous);
        let label = if current >= previous { "+100%" } else { "-100.0%" };
        return TrendIndicator::from_label(label.to_string());
    };
    change.rescale(1);

    let sign = if change.is_sign_negative() && !change.is_zero() {
        ""
    } else {
        "+"
    };
    // -0.0 would otherwise print with its sign
    let change = if change.is_zero() { change.abs() } else { change };
    TrendIndicator::from_label(format!("{}{}%", sign, change))
}

fn trend(metric: Metric, currency: Option<Currency>, current: Decimal, previous: Decimal) -> Trend {
    Trend {
        metric,
        currency,
        current,
        previous,
        indicator: trend_indicator(current, previous),
    }
}

fn bucket_trends<'a>(
    metric: Metric,
    current: &'a CurrencyBucket,
    previous: &'a CurrencyBucket,
) -> impl Iterator<Item = Trend> + 'a {
    Currency::ALL.into_iter().map(move |currency| {
        trend(
            metric,
            Some(currency),
            current.get(currency),
            previous.get(currency),
        )
    })
}

/// One trend per monetary metric and currency, plus the active-student trend.
pub fn build_trends(
    current: &PeriodTotals,
    previous: &PeriodTotals,
    active_students: (usize, usize),
) -> Vec<Trend> {
    let mut trends: Vec<Trend> = Vec::new();
    trends.extend(bucket_trends(Metric::Income, &current.income, &previous.income));
    trends.extend(bucket_trends(Metric::Refunds, &current.refunds, &previous.refunds));
    trends.extend(bucket_trends(Metric::Expenses, &current.expenses, &previous.expenses));
    trends.extend(bucket_trends(Metric::Profit, &current.profit, &previous.profit));

    let (now, before) = active_students;
    trends.push(trend(
        Metric::ActiveStudents,
        None,
        Decimal::from(now),
        Decimal::from(before),
    ));
    trends
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn label(current: Decimal, previous: Decimal) -> String {
        trend_indicator(current, previous).to_string()
    }

    #[test]
    fn test_zero_baseline_sentinels() {
        assert_eq!(label(dec!(0), dec!(0)), "0%");
        assert_eq!(label(dec!(50), dec!(0)), "+100%");
        assert_eq!(label(dec!(-5), dec!(0)), "0%");
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(label(dec!(150), dec!(100)), "+50.0%");
        assert_eq!(label(dec!(50), dec!(100)), "-50.0%");
        assert_eq!(label(dec!(100), dec!(100)), "+0.0%");
        assert_eq!(label(dec!(0), dec!(80)), "-100.0%");
    }

    #[test]
    fn test_rounds_to_one_decimal() {
        assert_eq!(label(dec!(1), dec!(3)), "-66.7%");
        assert_eq!(label(dec!(4), dec!(3)), "+33.3%");
        assert_eq!(label(dec!(100.05), dec!(100)), "+0.1%");
        assert!(trend_indicator(dec!(1), dec!(3)).is_negative());
    }

    #[test]
    fn test_out_of_range_change_saturates() {
        assert_eq!(label(dec!(1000000000000000000000000000), dec!(1)), "+100%");
        assert_eq!(label(Decimal::MIN, Decimal::MAX), "-100.0%");
        assert_eq!(label(Decimal::MAX, Decimal::MIN), "+100%");
    }

    #[test]
    fn test_tiny_decrease_rounds_to_unsigned_zero() {
        assert_eq!(label(dec!(99.99), dec!(100)), "+0.0%");
    }

    #[test]
    fn test_build_trends_covers_every_metric_and_currency() {
        let mut current = PeriodTotals::default();
        current.income.add(Currency::Usd, dec!(150));
        let mut previous = PeriodTotals::default();
        previous.income.add(Currency::Usd, dec!(100));

        let trends = build_trends(&current, &previous, (3, 0));

        assert_eq!(trends.len(), 4 * Currency::ALL.len() + 1);
        let usd_income = trends
            .iter()
            .find(|t| t.metric == Metric::Income && t.currency == Some(Currency::Usd))
            .unwrap();
        assert_eq!(usd_income.indicator.as_str(), "+50.0%");
        let students = trends.last().unwrap();
        assert_eq!(students.metric, Metric::ActiveStudents);
        assert_eq!(students.indicator.as_str(), "+100%");
    }
}
