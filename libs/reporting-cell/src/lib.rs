// Admin dashboard: visit counts, revenue, charges and lab orders per timespan
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{Timespan, TimespanReport, ReportError};

pub use router::dashboard_routes;

pub use services::ReportService;
