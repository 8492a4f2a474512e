// libs/reporting-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// TIMESPAN PRESETS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Timespan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timespan::Day => "day",
            Timespan::Week => "week",
            Timespan::Month => "month",
            Timespan::Year => "year",
            Timespan::All => "all",
        }
    }

    pub fn granularity(&self) -> BucketGranularity {
        match self {
            Timespan::Day => BucketGranularity::Day,
            Timespan::Week => BucketGranularity::Week,
            Timespan::Month => BucketGranularity::Month,
            Timespan::Year | Timespan::All => BucketGranularity::Year,
        }
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timespan {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Timespan::Day),
            "week" => Ok(Timespan::Week),
            "month" => Ok(Timespan::Month),
            "year" => Ok(Timespan::Year),
            "all" => Ok(Timespan::All),
            other => Err(ReportError::UnknownTimespan(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BucketGranularity {
    Day,
    Week,
    Month,
    Year,
}

/// Resolved boundaries of a report. `None` bounds are open, which is how the
/// all-time preset reads everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimespanWindow {
    pub timespan: Timespan,
    pub current_start: Option<DateTime<Utc>>,
    pub previous_start: Option<DateTime<Utc>>,
    pub history_start: Option<DateTime<Utc>>,
    pub granularity: BucketGranularity,
}

impl TimespanWindow {
    /// All-time reports compare the totals against themselves.
    pub fn previous_mirrors_current(&self) -> bool {
        self.timespan == Timespan::All
    }

    pub fn in_current(&self, at: DateTime<Utc>) -> bool {
        self.current_start.map_or(true, |start| at >= start)
    }

    pub fn in_previous(&self, at: DateTime<Utc>) -> bool {
        match (self.previous_start, self.current_start) {
            (Some(previous), Some(current)) => at >= previous && at < current,
            _ => false,
        }
    }

    pub fn in_history(&self, at: DateTime<Utc>) -> bool {
        self.history_start.map_or(true, |start| at >= start)
    }

    /// Earliest instant any part of the report reads.
    pub fn fetch_start(&self) -> Option<DateTime<Utc>> {
        [self.current_start, self.previous_start, self.history_start]
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .and_then(|bounds| bounds.into_iter().min())
    }
}

// ==============================================================================
// SOURCE ROWS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeType {
    Consultation,
    Laboratory,
    Procedure,
    Medication,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAmount {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeAmount {
    pub amount: Decimal,
    pub charge_type: ChargeType,
}

/// A visit with its payments and charges embedded as separate arrays, so each
/// relation is summed on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitActivity {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payments: Vec<PaymentAmount>,
    #[serde(default)]
    pub charges: Vec<ChargeAmount>,
}

impl VisitActivity {
    pub fn revenue(&self) -> Decimal {
        self.payments.iter().map(|payment| payment.amount).sum()
    }

    pub fn charged(&self) -> Decimal {
        self.charges.iter().map(|charge| charge.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTestRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTestRequestRow {
    pub lab_test_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub lab_tests: Option<LabTestRef>,
}

// ==============================================================================
// REPORT
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitSummary {
    pub count: u64,
    pub previous_count: u64,
    pub revenue: Decimal,
    pub previous_revenue: Decimal,
    pub charges: Decimal,
    pub previous_charges: Decimal,
    pub count_trend: f64,
    pub revenue_trend: f64,
    pub charges_trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBucket {
    pub time: NaiveDate,
    pub count: u64,
    pub revenue: Decimal,
    pub charges: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargesBreakdown {
    pub consultation: Decimal,
    pub laboratory: Decimal,
    pub procedure: Decimal,
    pub medication: Decimal,
    pub other: Decimal,
}

impl Default for ChargesBreakdown {
    fn default() -> Self {
        let zero = Decimal::new(0, 2);
        Self {
            consultation: zero,
            laboratory: zero,
            procedure: zero,
            medication: zero,
            other: zero,
        }
    }
}

impl ChargesBreakdown {
    pub fn add(&mut self, charge_type: ChargeType, amount: Decimal) {
        let slot = match charge_type {
            ChargeType::Consultation => &mut self.consultation,
            ChargeType::Laboratory => &mut self.laboratory,
            ChargeType::Procedure => &mut self.procedure,
            ChargeType::Medication => &mut self.medication,
            ChargeType::Other => &mut self.other,
        };
        *slot += amount;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestOrderCount {
    pub lab_test_id: Uuid,
    pub name: String,
    pub order_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimespanReport {
    pub timespan: Timespan,
    pub granularity: BucketGranularity,
    pub generated_at: DateTime<Utc>,
    pub visit_data: VisitSummary,
    pub history: Vec<HistoryBucket>,
    pub charges_breakdown: ChargesBreakdown,
    pub most_ordered_tests: Vec<LabTestOrderCount>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    #[error("Unknown timespan value.")]
    UnknownTimespan(String),

    #[error("Report window out of range")]
    WindowOutOfRange,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for ReportError {
    fn from(err: anyhow::Error) -> Self {
        ReportError::DatabaseError(err.to_string())
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::UnknownTimespan(_) => AppError::BadRequest(err.to_string()),
            ReportError::WindowOutOfRange => AppError::Internal(err.to_string()),
            ReportError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
