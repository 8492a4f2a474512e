// libs/visit-cell/src/services/visit.rs
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    AmountRow, CheckInRequest, TransitionOutcome, Visit, VisitBalance, VisitError,
    VisitStatus, VisitStatusLog, VisitWithFinancials,
};
use crate::services::lifecycle::TransitionTable;

pub struct VisitService {
    supabase: SupabaseClient,
    table: TransitionTable,
}

impl VisitService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            table: TransitionTable::canonical(),
        }
    }

    pub fn transition_table(&self) -> &TransitionTable {
        &self.table
    }

    /// Register a visit at the front desk. The visit starts awaiting payment
    /// and gets its first history row straight away.
    #[instrument(skip(self, request, auth_token), fields(patient_id = %request.patient_id))]
    pub async fn check_in(
        &self,
        request: CheckInRequest,
        actor: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        debug!("Checking in visit for patient {}", request.patient_id);

        let patient_path = format!("/rest/v1/patients?id=eq.{}&select=id", request.patient_id);
        let patients: Vec<Value> = self.supabase.request(
            Method::GET,
            &patient_path,
            Some(auth_token),
            None,
        ).await?;

        if patients.is_empty() {
            return Err(VisitError::PatientNotFound);
        }

        let chief_complaint = request.chief_complaint
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        let now = Utc::now();
        let visit_data = json!({
            "patient_id": request.patient_id,
            "visit_category": request.visit_category,
            "visit_status": VisitStatus::AwaitingPayment,
            "chief_complaint": chief_complaint,
            "current_status_since": now.to_rfc3339(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let created: Vec<Visit> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/visits",
            Some(auth_token),
            Some(visit_data),
            Some(SupabaseClient::return_representation()),
        ).await?;

        let visit = created.into_iter().next()
            .ok_or_else(|| VisitError::DatabaseError("Failed to create visit".to_string()))?;

        if let Err(log_error) = self.append_status_log(visit.id, visit.visit_status, now, actor, auth_token).await {
            error!("Failed to record initial history for visit {}: {}", visit.id, log_error);

            match self.delete_visit(visit.id, auth_token).await {
                Ok(()) => warn!("Removed visit {} after history failure", visit.id),
                Err(cleanup_error) => error!("Failed to remove visit {}: {}", visit.id, cleanup_error),
            }

            return Err(log_error);
        }

        info!("Visit {} checked in for patient {}", visit.id, visit.patient_id);
        Ok(visit)
    }

    pub async fn get_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<Visit, VisitError> {
        debug!("Fetching visit: {}", visit_id);

        let path = format!("/rest/v1/visits?id=eq.{}", visit_id);
        let result: Vec<Visit> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        result.into_iter().next().ok_or(VisitError::NotFound)
    }

    /// Move the visit to `target` if it is the table successor of the current
    /// status or a valid cancellation. Requesting the current status is a no-op.
    #[instrument(skip(self, auth_token))]
    pub async fn advance_to(
        &self,
        visit_id: Uuid,
        target: VisitStatus,
        actor: Option<Uuid>,
        auth_token: &str,
    ) -> Result<TransitionOutcome, VisitError> {
        let visit = self.get_visit(visit_id, auth_token).await?;

        match self.table.plan_transition(visit.visit_status, target)? {
            Some(to) => self.apply_transition(visit, to, actor, auth_token).await,
            None => {
                debug!("Visit {} already in {}, nothing to do", visit_id, target);
                Ok(TransitionOutcome::Unchanged { visit })
            }
        }
    }

    /// Move the visit to the table successor of its current status.
    #[instrument(skip(self, auth_token))]
    pub async fn advance_to_next(
        &self,
        visit_id: Uuid,
        actor: Option<Uuid>,
        auth_token: &str,
    ) -> Result<TransitionOutcome, VisitError> {
        let visit = self.get_visit(visit_id, auth_token).await?;
        let next = self.table.plan_next(visit.visit_status)?;

        self.apply_transition(visit, next, actor, auth_token).await
    }

    pub async fn cancel(
        &self,
        visit_id: Uuid,
        actor: Option<Uuid>,
        auth_token: &str,
    ) -> Result<TransitionOutcome, VisitError> {
        self.advance_to(visit_id, VisitStatus::Cancelled, actor, auth_token).await
    }

    pub async fn valid_targets(
        &self,
        visit_id: Uuid,
        auth_token: &str,
    ) -> Result<(Visit, Vec<VisitStatus>), VisitError> {
        let visit = self.get_visit(visit_id, auth_token).await?;
        let targets = self.table.valid_targets(visit.visit_status);
        Ok((visit, targets))
    }

    /// Status history, newest first.
    pub async fn status_history(
        &self,
        visit_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<VisitStatusLog>, VisitError> {
        self.get_visit(visit_id, auth_token).await?;

        let path = format!(
            "/rest/v1/visit_status_logs?visit_id=eq.{}&order=changed_at.desc",
            visit_id
        );
        let logs: Vec<VisitStatusLog> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(logs)
    }

    /// Charges and payments are summed in separate queries so neither side is
    /// multiplied by the row count of the other.
    pub async fn compute_balance(
        &self,
        visit_id: Uuid,
        auth_token: &str,
    ) -> Result<VisitBalance, VisitError> {
        self.get_visit(visit_id, auth_token).await?;
        self.balance_for(visit_id, auth_token).await
    }

    pub async fn get_visit_with_financials(
        &self,
        visit_id: Uuid,
        auth_token: &str,
    ) -> Result<VisitWithFinancials, VisitError> {
        let visit = self.get_visit(visit_id, auth_token).await?;
        let balance = self.balance_for(visit_id, auth_token).await?;

        Ok(VisitWithFinancials {
            visit,
            total_charged: balance.total_charged,
            total_paid: balance.total_paid,
            balance: balance.balance,
        })
    }

    async fn balance_for(&self, visit_id: Uuid, auth_token: &str) -> Result<VisitBalance, VisitError> {
        let charges_path = format!("/rest/v1/charges?visit_id=eq.{}&select=amount", visit_id);
        let charges: Vec<AmountRow> = self.supabase.request(
            Method::GET,
            &charges_path,
            Some(auth_token),
            None,
        ).await?;

        let payments_path = format!("/rest/v1/payments?visit_id=eq.{}&select=amount", visit_id);
        let payments: Vec<AmountRow> = self.supabase.request(
            Method::GET,
            &payments_path,
            Some(auth_token),
            None,
        ).await?;

        Ok(VisitBalance::from_amounts(
            visit_id,
            charges.into_iter().map(|row| row.amount),
            payments.into_iter().map(|row| row.amount),
        ))
    }

    /// Compare-and-set the status, then append the history row. The update only
    /// matches while the stored status still equals the one that was read, so
    /// two racing requests cannot both commit from the same prior status.
    async fn apply_transition(
        &self,
        visit: Visit,
        to: VisitStatus,
        actor: Option<Uuid>,
        auth_token: &str,
    ) -> Result<TransitionOutcome, VisitError> {
        let from = visit.visit_status;
        let now = Utc::now();

        let updated = self.compare_and_set_status(
            visit.id,
            from,
            to,
            now,
            auth_token,
        ).await?;

        let updated = match updated {
            Some(updated) => updated,
            None => {
                let current = self.get_visit(visit.id, auth_token).await?;
                warn!(
                    "Visit {} changed concurrently: expected {}, found {}",
                    visit.id, from, current.visit_status
                );
                return Err(VisitError::ConcurrentModification {
                    expected: from,
                    actual: current.visit_status,
                });
            }
        };

        if let Err(log_error) = self.append_status_log(visit.id, to, now, actor, auth_token).await {
            error!("Failed to record status history for visit {}: {}", visit.id, log_error);

            match self.compare_and_set_status(visit.id, to, from, visit.current_status_since, auth_token).await {
                Ok(Some(_)) => warn!("Reverted visit {} to {} after history failure", visit.id, from),
                Ok(None) => error!("Visit {} moved on before it could be reverted to {}", visit.id, from),
                Err(revert_error) => error!("Failed to revert visit {}: {}", visit.id, revert_error),
            }

            return Err(log_error);
        }

        info!(
            visit_id = %visit.id,
            changed_by = ?actor,
            "Visit status changed: {} -> {}", from, to
        );

        Ok(TransitionOutcome::Applied { from, to, visit: updated })
    }

    async fn compare_and_set_status(
        &self,
        visit_id: Uuid,
        expected: VisitStatus,
        new_status: VisitStatus,
        status_since: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Option<Visit>, VisitError> {
        let path = format!(
            "/rest/v1/visits?id=eq.{}&visit_status=eq.{}",
            visit_id,
            expected.code()
        );

        let update_data = json!({
            "visit_status": new_status,
            "current_status_since": status_since.to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Visit> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(update_data),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Ok(result.into_iter().next())
    }

    /// Only used to undo a check-in whose first history row could not be written.
    async fn delete_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<(), VisitError> {
        let path = format!("/rest/v1/visits?id=eq.{}", visit_id);

        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::return_representation()),
        ).await?;

        Ok(())
    }

    async fn append_status_log(
        &self,
        visit_id: Uuid,
        status: VisitStatus,
        changed_at: DateTime<Utc>,
        changed_by: Option<Uuid>,
        auth_token: &str,
    ) -> Result<VisitStatusLog, VisitError> {
        let log_data = json!({
            "visit_id": visit_id,
            "status": status,
            "changed_at": changed_at.to_rfc3339(),
            "changed_by": changed_by
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/visit_status_logs",
            Some(auth_token),
            Some(log_data),
            Some(SupabaseClient::return_representation()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| VisitError::DatabaseError("Failed to record visit status history".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| VisitError::DatabaseError(e.to_string()))
    }
}
