//! Currency bucketing of payment and expense records.
//!
//! Every function here is pure: records in, buckets out. Malformed records
//! never abort a pass; their amount is coerced to zero and they are counted
//! in the bucket their currency resolves to.

use chrono::NaiveDateTime;
use tracing::debug;

use super::period::PeriodWindow;
use super::fields::{FieldLookup, EXPENSE_DATE, PAYMENT_DATE};
use crate::models::{Currency, CurrencyBucket, RawRecord};

/// Expense statuses that never count towards spending.
const VOID_EXPENSE_STATUSES: [&str; 3] = ["cancelled", "canceled", "rejected"];

/// Restricts a pass to records dated inside a window.
#[derive(Clone, Copy)]
pub struct WindowFilter<'a> {
    window: &'a PeriodWindow,
    dates: &'a FieldLookup<NaiveDateTime>,
    keep_undated: bool,
}

impl<'a> WindowFilter<'a> {
    /// Records without a parseable date are dropped.
    pub fn strict(window: &'a PeriodWindow, dates: &'a FieldLookup<NaiveDateTime>) -> Self {
        Self {
            window,
            dates,
            keep_undated: false,
        }
    }

    /// Records without a parseable date are kept. Used on feeds the server
    /// already scoped to the window.
    pub fn lenient(window: &'a PeriodWindow, dates: &'a FieldLookup<NaiveDateTime>) -> Self {
        Self {
            window,
            dates,
            keep_undated: true,
        }
    }

    pub fn admits(&self, record: &RawRecord) -> bool {
        match self.dates.resolve(record) {
            Some(timestamp) => self.window.contains(timestamp),
            None => self.keep_undated,
        }
    }
}

/// Sum the amounts of every record matching `predicate` into a bucket.
pub fn bucket_records<P>(
    records: &[RawRecord],
    predicate: P,
    filter: Option<WindowFilter<'_>>,
    base: Currency,
) -> CurrencyBucket
where
    P: Fn(&RawRecord) -> bool,
{
    let mut bucket = CurrencyBucket::new();
    for record in records {
        if !predicate(record) {
            continue;
        }
        if filter.map_or(false, |f| !f.admits(record)) {
            continue;
        }
        credit(&mut bucket, record, base);
    }
    bucket
}

/// Add a record's amount to its currency's total. A record whose amount
/// would overflow the total is skipped.
fn credit(bucket: &mut CurrencyBucket, record: &RawRecord, base: Currency) {
    let currency = record.currency(base);
    let amount = record.amount();
    if !bucket.add(currency, amount) {
        debug!(
            "Skipped {} {} record: running total would overflow",
            amount, currency
        );
    }
}

/// How a payment contributes to the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentClass {
    Income,
    Refund,
    Excluded,
}

impl PaymentClass {
    pub fn of(record: &RawRecord) -> Self {
        if record.has_status("completed") {
            PaymentClass::Income
        } else if record.has_status("refunded") {
            PaymentClass::Refund
        } else {
            PaymentClass::Excluded
        }
    }
}

/// Income and refund buckets produced by one pass over the payments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentBuckets {
    pub income: CurrencyBucket,
    pub refunds: CurrencyBucket,
}

impl PaymentBuckets {
    fn absorb(mut self, record: &RawRecord, base: Currency) -> Self {
        let target = match PaymentClass::of(record) {
            PaymentClass::Income => &mut self.income,
            PaymentClass::Refund => &mut self.refunds,
            PaymentClass::Excluded => return self,
        };
        credit(target, record, base);
        self
    }
}

/// Split payments into income (completed) and refunds (refunded) in a
/// single traversal. Any other status lands in neither bucket.
pub fn classify_payments(
    payments: &[RawRecord],
    filter: Option<WindowFilter<'_>>,
    base: Currency,
) -> PaymentBuckets {
    payments
        .iter()
        .filter(|record| filter.map_or(true, |f| f.admits(record)))
        .fold(PaymentBuckets::default(), |acc, record| {
            acc.absorb(record, base)
        })
}

/// Whether an expense counts towards spending.
pub fn is_countable_expense(record: &RawRecord) -> bool {
    !VOID_EXPENSE_STATUSES
        .iter()
        .any(|status| record.has_status(status))
}

/// Income minus expenses for every currency present in either bucket.
pub fn net_profit(income: &CurrencyBucket, expenses: &CurrencyBucket) -> CurrencyBucket {
    let mut profit = CurrencyBucket::new();
    let mut currencies: Vec<Currency> = income
        .currencies()
        .chain(expenses.currencies())
        .collect();
    currencies.sort();
    currencies.dedup();

    for currency in currencies {
        match income.get(currency).checked_sub(expenses.get(currency)) {
            Some(difference) => {
                profit.add(currency, difference);
            }
            None => debug!("Net profit for {} overflowed, left at zero", currency),
        }
    }
    profit
}

/// Every monetary total for one set of payments and expenses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub income: CurrencyBucket,
    pub refunds: CurrencyBucket,
    pub expenses: CurrencyBucket,
    pub profit: CurrencyBucket,
}

/// How record dates are matched against a window when computing totals.
#[derive(Debug, Clone, Copy)]
pub enum Windowing<'a> {
    /// Every record counts.
    All,
    /// Only records dated inside the window.
    Strict(&'a PeriodWindow),
    /// Records dated outside the window are dropped, undated ones kept.
    Lenient(&'a PeriodWindow),
}

impl PeriodTotals {
    pub fn compute(
        payments: &[RawRecord],
        expense_records: &[RawRecord],
        windowing: Windowing<'_>,
        base: Currency,
    ) -> Self {
        let (payment_filter, expense_filter) = match windowing {
            Windowing::All => (None, None),
            Windowing::Strict(window) => (
                Some(WindowFilter::strict(window, &PAYMENT_DATE)),
                Some(WindowFilter::strict(window, &EXPENSE_DATE)),
            ),
            Windowing::Lenient(window) => (
                Some(WindowFilter::lenient(window, &PAYMENT_DATE)),
                Some(WindowFilter::lenient(window, &EXPENSE_DATE)),
            ),
        };

        let PaymentBuckets { income, refunds } = classify_payments(payments, payment_filter, base);
        let expenses = bucket_records(expense_records, is_countable_expense, expense_filter, base);
        let profit = net_profit(&income, &expenses);

        debug!(
            "Bucketed {} payments and {} expenses ({:?})",
            payments.len(),
            expense_records.len(),
            windowing
        );

        Self {
            income,
            refunds,
            expenses,
            profit,
        }
    }
}
