// Visit lifecycle: check-in, status transitions with history, and balances
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Visit, VisitCategory, VisitStatus, VisitStatusLog, VisitBalance,
    TransitionOutcome, VisitError,
};

pub use router::visit_routes;

pub use services::{TransitionTable, VisitService};
