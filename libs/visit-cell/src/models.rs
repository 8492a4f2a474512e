// libs/visit-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CORE VISIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_category: VisitCategory,
    pub visit_status: VisitStatus,
    #[serde(default)]
    pub chief_complaint: String,
    pub current_status_since: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitCategory {
    HistoryAndPhysical,
    MedicalCertificate,
    ProgressNote,
    Other,
}

/// Station of the clinic a visit is waiting at. Stored as the short codes
/// the `visits.visit_status` column holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VisitStatus {
    #[serde(rename = "PAY", alias = "AWAITING_PAYMENT")]
    AwaitingPayment,

    #[serde(rename = "VIT", alias = "AWAITING_VITALS")]
    AwaitingVitals,

    #[serde(rename = "CON", alias = "AWAITING_CONSULTATION")]
    AwaitingConsultation,

    #[serde(rename = "INC", alias = "IN_CONSULTATION")]
    InConsultation,

    #[serde(rename = "LBP", alias = "AWAITING_LAB_PAYMENT")]
    AwaitingLabPayment,

    #[serde(rename = "LBS", alias = "AWAITING_LAB_SAMPLE")]
    AwaitingLabSample,

    #[serde(rename = "REV", alias = "AWAITING_REVIEW")]
    AwaitingReview,

    #[serde(rename = "FIN", alias = "COMPLETED")]
    Completed,

    #[serde(rename = "CAN", alias = "CANCELLED")]
    Cancelled,

    #[serde(rename = "OTH", alias = "OTHER")]
    Other,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 10] = [
        VisitStatus::AwaitingPayment,
        VisitStatus::AwaitingVitals,
        VisitStatus::AwaitingConsultation,
        VisitStatus::InConsultation,
        VisitStatus::AwaitingLabPayment,
        VisitStatus::AwaitingLabSample,
        VisitStatus::AwaitingReview,
        VisitStatus::Completed,
        VisitStatus::Cancelled,
        VisitStatus::Other,
    ];

    /// Stored column value, also used in PostgREST filters.
    pub fn code(&self) -> &'static str {
        match self {
            VisitStatus::AwaitingPayment => "PAY",
            VisitStatus::AwaitingVitals => "VIT",
            VisitStatus::AwaitingConsultation => "CON",
            VisitStatus::InConsultation => "INC",
            VisitStatus::AwaitingLabPayment => "LBP",
            VisitStatus::AwaitingLabSample => "LBS",
            VisitStatus::AwaitingReview => "REV",
            VisitStatus::Completed => "FIN",
            VisitStatus::Cancelled => "CAN",
            VisitStatus::Other => "OTH",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VisitStatus::AwaitingPayment => "Awaiting Visit Fee",
            VisitStatus::AwaitingVitals => "In Queue for Vitals",
            VisitStatus::AwaitingConsultation => "Awaiting Doctor Consultation",
            VisitStatus::InConsultation => "With Doctor",
            VisitStatus::AwaitingLabPayment => "Awaiting Lab Payment",
            VisitStatus::AwaitingLabSample => "Awaiting Lab Sample",
            VisitStatus::AwaitingReview => "Awaiting Results Review",
            VisitStatus::Completed => "Visit Finished",
            VisitStatus::Cancelled => "Visit Cancelled",
            VisitStatus::Other => "Other",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VisitStatus::Completed | VisitStatus::Cancelled)
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

/// One append-only row of a visit's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitStatusLog {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub status: VisitStatus,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<Uuid>,
}

// ==============================================================================
// FINANCIAL MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountRow {
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitBalance {
    pub visit_id: Uuid,
    pub total_charged: Decimal,
    pub total_paid: Decimal,
    pub balance: Decimal,
}

impl VisitBalance {
    /// Charges minus payments. Totals keep two decimal places even when a side is empty.
    pub fn from_amounts<C, P>(visit_id: Uuid, charges: C, payments: P) -> Self
    where
        C: IntoIterator<Item = Decimal>,
        P: IntoIterator<Item = Decimal>,
    {
        let zero = Decimal::new(0, 2);
        let total_charged = charges.into_iter().fold(zero, |acc, amount| acc + amount);
        let total_paid = payments.into_iter().fold(zero, |acc, amount| acc + amount);

        Self {
            visit_id,
            total_charged,
            total_paid,
            balance: total_charged - total_paid,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.balance <= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitWithFinancials {
    #[serde(flatten)]
    pub visit: Visit,
    pub total_charged: Decimal,
    pub total_paid: Decimal,
    pub balance: Decimal,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub patient_id: Uuid,
    pub visit_category: VisitCategory,
    pub chief_complaint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target_status: VisitStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        from: VisitStatus,
        to: VisitStatus,
        visit: Visit,
    },
    Unchanged {
        visit: Visit,
    },
}

impl TransitionOutcome {
    pub fn visit(&self) -> &Visit {
        match self {
            TransitionOutcome::Applied { visit, .. } => visit,
            TransitionOutcome::Unchanged { visit } => visit,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisitError {
    #[error("Visit not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Cannot move visit from {from} to {to}")]
    InvalidTransition { from: VisitStatus, to: VisitStatus },

    #[error("Visit in status {0} has no next status")]
    UndefinedSuccessor(VisitStatus),

    #[error("Visit status changed concurrently: expected {expected}, found {actual}")]
    ConcurrentModification { expected: VisitStatus, actual: VisitStatus },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<anyhow::Error> for VisitError {
    fn from(err: anyhow::Error) -> Self {
        VisitError::DatabaseError(err.to_string())
    }
}

impl From<VisitError> for AppError {
    fn from(err: VisitError) -> Self {
        match err {
            VisitError::NotFound | VisitError::PatientNotFound => AppError::NotFound(err.to_string()),
            VisitError::InvalidTransition { .. }
            | VisitError::UndefinedSuccessor(_)
            | VisitError::ConcurrentModification { .. } => AppError::Conflict(err.to_string()),
            VisitError::ValidationError(msg) => AppError::ValidationError(msg),
            VisitError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_codes_round_trip_through_serde() {
        for status in VisitStatus::ALL {
            let encoded = serde_json::to_value(status).unwrap();
            assert_eq!(encoded, serde_json::json!(status.code()));
            let decoded: VisitStatus = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, status);
        }
    }

    #[test]
    fn test_status_accepts_long_names() {
        let status: VisitStatus = serde_json::from_str("\"AWAITING_LAB_SAMPLE\"").unwrap();
        assert_eq!(status, VisitStatus::AwaitingLabSample);
    }

    #[test]
    fn test_balance_settled_visit() {
        let balance = VisitBalance::from_amounts(Uuid::nil(), vec![dec!(300)], vec![dec!(300)]);
        assert_eq!(balance.balance, dec!(0.00));
        assert_eq!(balance.balance.to_string(), "0.00");
        assert!(balance.is_settled());
    }

    #[test]
    fn test_balance_without_payments() {
        let balance = VisitBalance::from_amounts(Uuid::nil(), vec![dec!(300.00)], Vec::new());
        assert_eq!(balance.balance, dec!(300.00));
        assert_eq!(balance.total_paid.to_string(), "0.00");
        assert!(!balance.is_settled());
    }

    #[test]
    fn test_balance_without_any_rows() {
        let balance = VisitBalance::from_amounts(Uuid::nil(), Vec::new(), Vec::new());
        assert_eq!(balance.balance.to_string(), "0.00");
        assert_eq!(balance.total_charged.to_string(), "0.00");
    }

    #[test]
    fn test_balance_sums_multiple_rows() {
        let balance = VisitBalance::from_amounts(
            Uuid::nil(),
            vec![dec!(150.00), dec!(75.50), dec!(24.50)],
            vec![dec!(100.00), dec!(50.00)],
        );
        assert_eq!(balance.total_charged, dec!(250.00));
        assert_eq!(balance.total_paid, dec!(150.00));
        assert_eq!(balance.balance, dec!(100.00));
    }

    #[test]
    fn test_transition_errors_map_to_conflict() {
        let err = VisitError::UndefinedSuccessor(VisitStatus::Completed);
        assert!(matches!(AppError::from(err), AppError::Conflict(_)));
        assert!(matches!(AppError::from(VisitError::NotFound), AppError::NotFound(_)));
    }
}
