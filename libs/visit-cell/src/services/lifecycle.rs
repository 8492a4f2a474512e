// libs/visit-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{VisitError, VisitStatus};

const CANONICAL_SUCCESSORS: [(VisitStatus, VisitStatus); 6] = [
    (VisitStatus::AwaitingPayment, VisitStatus::AwaitingVitals),
    (VisitStatus::AwaitingVitals, VisitStatus::AwaitingConsultation),
    (VisitStatus::AwaitingConsultation, VisitStatus::AwaitingLabPayment),
    (VisitStatus::AwaitingLabPayment, VisitStatus::AwaitingLabSample),
    (VisitStatus::AwaitingLabSample, VisitStatus::AwaitingReview),
    (VisitStatus::AwaitingReview, VisitStatus::Completed),
];

/// Versioned mapping from a visit status to its single successor, plus the
/// cancellation rule. Every status decision in the cell goes through here.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTable {
    version: u32,
    successors: &'static [(VisitStatus, VisitStatus)],
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl TransitionTable {
    pub const fn canonical() -> Self {
        Self {
            version: 1,
            successors: &CANONICAL_SUCCESSORS,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn successor_of(&self, status: VisitStatus) -> Option<VisitStatus> {
        self.successors
            .iter()
            .find(|(from, _)| *from == status)
            .map(|(_, to)| *to)
    }

    /// Cancellation is open to every status that is not already terminal.
    pub fn can_cancel(&self, status: VisitStatus) -> bool {
        !status.is_terminal()
    }

    /// Decide what `advance_to` does. `Ok(None)` means the visit is already in
    /// `target` and nothing should be written.
    pub fn plan_transition(
        &self,
        current: VisitStatus,
        target: VisitStatus,
    ) -> Result<Option<VisitStatus>, VisitError> {
        debug!("Planning visit transition {} -> {} (table v{})", current, target, self.version);

        if current == target {
            return Ok(None);
        }

        let allowed = if target == VisitStatus::Cancelled {
            self.can_cancel(current)
        } else {
            self.successor_of(current) == Some(target)
        };

        if !allowed {
            warn!("Invalid visit transition attempted: {} -> {}", current, target);
            return Err(VisitError::InvalidTransition { from: current, to: target });
        }

        Ok(Some(target))
    }

    pub fn plan_next(&self, current: VisitStatus) -> Result<VisitStatus, VisitError> {
        self.successor_of(current)
            .ok_or(VisitError::UndefinedSuccessor(current))
    }

    /// Statuses `plan_transition` accepts from `current`, excluding the no-op.
    pub fn valid_targets(&self, current: VisitStatus) -> Vec<VisitStatus> {
        let mut targets: Vec<VisitStatus> = self.successor_of(current).into_iter().collect();
        if self.can_cancel(current) {
            targets.push(VisitStatus::Cancelled);
        }
        targets
    }

    /// Workflow order starting at check-in, following successors until a status has none.
    pub fn workflow(&self) -> Vec<VisitStatus> {
        let mut path = vec![VisitStatus::AwaitingPayment];
        let mut current = VisitStatus::AwaitingPayment;
        while let Some(next) = self.successor_of(current) {
            if path.contains(&next) {
                break;
            }
            path.push(next);
            current = next;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn table() -> TransitionTable {
        TransitionTable::canonical()
    }

    #[test]
    fn test_workflow_runs_from_payment_to_completion() {
        assert_eq!(table().workflow(), vec![
            VisitStatus::AwaitingPayment,
            VisitStatus::AwaitingVitals,
            VisitStatus::AwaitingConsultation,
            VisitStatus::AwaitingLabPayment,
            VisitStatus::AwaitingLabSample,
            VisitStatus::AwaitingReview,
            VisitStatus::Completed,
        ]);
    }

    #[test]
    fn test_every_workflow_status_has_exactly_one_successor() {
        let table = table();
        for status in table.workflow() {
            if status == VisitStatus::Completed {
                continue;
            }
            let successors = CANONICAL_SUCCESSORS.iter().filter(|(from, _)| *from == status).count();
            assert_eq!(successors, 1, "{} should have one successor", status);
            assert!(table.plan_next(status).is_ok());
        }
    }

    #[test]
    fn test_plan_next_fails_without_successor() {
        for status in [VisitStatus::Completed, VisitStatus::Cancelled, VisitStatus::Other, VisitStatus::InConsultation] {
            assert_eq!(table().plan_next(status), Err(VisitError::UndefinedSuccessor(status)));
        }
    }

    #[test]
    fn test_plan_transition_accepts_successor() {
        assert_eq!(
            table().plan_transition(VisitStatus::AwaitingVitals, VisitStatus::AwaitingConsultation),
            Ok(Some(VisitStatus::AwaitingConsultation))
        );
    }

    #[test]
    fn test_plan_transition_rejects_skipping_ahead() {
        assert_matches!(
            table().plan_transition(VisitStatus::AwaitingPayment, VisitStatus::AwaitingConsultation),
            Err(VisitError::InvalidTransition { from: VisitStatus::AwaitingPayment, to: VisitStatus::AwaitingConsultation })
        );
    }

    #[test]
    fn test_plan_transition_rejects_moving_backwards() {
        assert_matches!(
            table().plan_transition(VisitStatus::AwaitingReview, VisitStatus::AwaitingVitals),
            Err(VisitError::InvalidTransition { .. })
        );
    }

    #[test]
    fn test_same_status_is_a_no_op() {
        for status in VisitStatus::ALL {
            assert_eq!(table().plan_transition(status, status), Ok(None));
        }
    }

    #[test]
    fn test_cancellation_allowed_from_every_non_terminal_status() {
        for status in VisitStatus::ALL {
            let result = table().plan_transition(status, VisitStatus::Cancelled);
            match status {
                VisitStatus::Completed => assert_matches!(result, Err(VisitError::InvalidTransition { .. })),
                VisitStatus::Cancelled => assert_eq!(result, Ok(None)),
                _ => assert_eq!(result, Ok(Some(VisitStatus::Cancelled))),
            }
        }
    }

    #[test]
    fn test_cancelled_visit_cannot_resume() {
        assert_matches!(
            table().plan_transition(VisitStatus::Cancelled, VisitStatus::AwaitingVitals),
            Err(VisitError::InvalidTransition { .. })
        );
    }

    #[test]
    fn test_valid_targets() {
        assert_eq!(
            table().valid_targets(VisitStatus::AwaitingLabPayment),
            vec![VisitStatus::AwaitingLabSample, VisitStatus::Cancelled]
        );
        assert_eq!(table().valid_targets(VisitStatus::Other), vec![VisitStatus::Cancelled]);
        assert!(table().valid_targets(VisitStatus::Completed).is_empty());
    }

    #[test]
    fn test_canonical_version() {
        assert_eq!(TransitionTable::default().version(), 1);
    }
}
