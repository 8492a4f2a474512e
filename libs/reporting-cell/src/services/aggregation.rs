// libs/reporting-cell/src/services/aggregation.rs
use std::collections::{BTreeMap, HashMap};

use chrono::{FixedOffset, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    ChargesBreakdown, HistoryBucket, LabTestOrderCount, LabTestRequestRow, TimespanWindow,
    VisitActivity, VisitSummary,
};
use crate::services::windows::bucket_of;

const TOP_LAB_TESTS: usize = 5;

fn zero() -> Decimal {
    Decimal::new(0, 2)
}

/// Percentage change against the previous period. A previous value of zero
/// is treated as one.
pub fn trend(current: Decimal, previous: Decimal) -> f64 {
    let denominator = if previous.is_zero() { Decimal::ONE } else { previous };
    ((current - previous) / denominator * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(0.0)
}

#[derive(Clone)]
struct Totals {
    count: u64,
    revenue: Decimal,
    charges: Decimal,
}

impl Totals {
    fn new() -> Self {
        Self { count: 0, revenue: zero(), charges: zero() }
    }

    fn add(&mut self, visit: &VisitActivity) {
        self.count += 1;
        self.revenue += visit.revenue();
        self.charges += visit.charged();
    }
}

pub fn summarize(visits: &[VisitActivity], window: &TimespanWindow) -> VisitSummary {
    let mut current = Totals::new();
    let mut previous = Totals::new();

    for visit in visits {
        if window.in_current(visit.created_at) {
            current.add(visit);
        } else if window.in_previous(visit.created_at) {
            previous.add(visit);
        }
    }

    if window.previous_mirrors_current() {
        previous = current.clone();
    }

    VisitSummary {
        count: current.count,
        previous_count: previous.count,
        revenue: current.revenue,
        previous_revenue: previous.revenue,
        charges: current.charges,
        previous_charges: previous.charges,
        count_trend: trend(current.count.into(), previous.count.into()),
        revenue_trend: trend(current.revenue, previous.revenue),
        charges_trend: trend(current.charges, previous.charges),
    }
}

/// Per-bucket totals over the history range, ascending. Buckets without
/// visits are left out.
pub fn history(
    visits: &[VisitActivity],
    window: &TimespanWindow,
    offset: FixedOffset,
) -> Vec<HistoryBucket> {
    let mut buckets: BTreeMap<NaiveDate, Totals> = BTreeMap::new();

    for visit in visits.iter().filter(|visit| window.in_history(visit.created_at)) {
        let key = bucket_of(visit.created_at, window.granularity, offset);
        buckets.entry(key).or_insert_with(Totals::new).add(visit);
    }

    buckets
        .into_iter()
        .map(|(time, totals)| HistoryBucket {
            time,
            count: totals.count,
            revenue: totals.revenue,
            charges: totals.charges,
        })
        .collect()
}

pub fn charges_breakdown(visits: &[VisitActivity], window: &TimespanWindow) -> ChargesBreakdown {
    let mut breakdown = ChargesBreakdown::default();

    for visit in visits.iter().filter(|visit| window.in_current(visit.created_at)) {
        for charge in &visit.charges {
            breakdown.add(charge.charge_type, charge.amount);
        }
    }

    breakdown
}

/// Most requested lab tests in the current window, by count then name.
pub fn most_ordered_tests(
    requests: &[LabTestRequestRow],
    window: &TimespanWindow,
) -> Vec<LabTestOrderCount> {
    let mut counts: HashMap<Uuid, LabTestOrderCount> = HashMap::new();

    for request in requests.iter().filter(|request| window.in_current(request.created_at)) {
        let entry = counts.entry(request.lab_test_id).or_insert_with(|| LabTestOrderCount {
            lab_test_id: request.lab_test_id,
            name: request.lab_tests.as_ref().map(|test| test.name.clone()).unwrap_or_default(),
            order_count: 0,
        });
        entry.order_count += 1;
    }

    let mut ranked: Vec<LabTestOrderCount> = counts.into_values().collect();
    ranked.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.lab_test_id.cmp(&b.lab_test_id))
    });
    ranked.truncate(TOP_LAB_TESTS);
    ranked
}
