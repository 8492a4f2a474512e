pub mod aggregation;
pub mod report;
pub mod windows;

pub use report::ReportService;
