// libs/reporting-cell/src/services/report.rs
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    LabTestRequestRow, ReportError, Timespan, TimespanReport, TimespanWindow, VisitActivity,
};
use crate::services::aggregation;
use crate::services::windows::resolve_window;

const VISIT_ACTIVITY_SELECT: &str = "id,created_at,payments(amount),charges(amount,charge_type)";
const LAB_REQUEST_SELECT: &str = "lab_test_id,created_at,lab_tests(id,name)";

/// Kept at or below PostgREST's default `db-max-rows`, so a short page
/// always means the last page.
const DEFAULT_PAGE_SIZE: usize = 1000;

fn gte_filter(bound: Option<DateTime<Utc>>) -> String {
    bound
        .map(|at| format!("&created_at=gte.{}", at.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or_default()
}

pub struct ReportService {
    supabase: SupabaseClient,
    offset: FixedOffset,
    page_size: usize,
}

impl ReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            offset: config.clinic_offset(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn timespan_report(
        &self,
        timespan: Timespan,
        auth_token: &str,
    ) -> Result<TimespanReport, ReportError> {
        self.timespan_report_at(timespan, Utc::now(), auth_token).await
    }

    #[instrument(skip(self, auth_token))]
    pub async fn timespan_report_at(
        &self,
        timespan: Timespan,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<TimespanReport, ReportError> {
        let window = resolve_window(timespan, now, self.offset)?;
        debug!("Resolved {} window: {:?}", timespan, window);

        let report = self.get_timespan_report(&window, now, auth_token).await?;

        info!(
            "Built {} report: {} visits, {} history buckets",
            timespan,
            report.visit_data.count,
            report.history.len()
        );

        Ok(report)
    }

    /// Visits are fetched once with payments and charges embedded per visit,
    /// then every figure is aggregated from those rows.
    pub async fn get_timespan_report(
        &self,
        window: &TimespanWindow,
        generated_at: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<TimespanReport, ReportError> {
        let visits = self.fetch_visit_activity(window.fetch_start(), auth_token).await?;
        let lab_requests = self.fetch_lab_requests(window.current_start, auth_token).await?;

        Ok(TimespanReport {
            timespan: window.timespan,
            granularity: window.granularity,
            generated_at,
            visit_data: aggregation::summarize(&visits, window),
            history: aggregation::history(&visits, window, self.offset),
            charges_breakdown: aggregation::charges_breakdown(&visits, window),
            most_ordered_tests: aggregation::most_ordered_tests(&lab_requests, window),
        })
    }

    async fn fetch_visit_activity(
        &self,
        since: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Vec<VisitActivity>, ReportError> {
        let path = format!(
            "/rest/v1/visits?select={}{}&order=created_at.asc,id.asc",
            VISIT_ACTIVITY_SELECT,
            gte_filter(since)
        );

        let visits: Vec<VisitActivity> = self.fetch_all_pages(&path, auth_token).await?;

        debug!("Fetched {} visits for reporting", visits.len());
        Ok(visits)
    }

    async fn fetch_lab_requests(
        &self,
        since: Option<DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Vec<LabTestRequestRow>, ReportError> {
        let path = format!(
            "/rest/v1/lab_test_requests?select={}{}&order=created_at.asc,id.asc",
            LAB_REQUEST_SELECT,
            gte_filter(since)
        );

        self.fetch_all_pages(&path, auth_token).await
    }

    /// Walk `limit`/`offset` pages until one comes back short.
    async fn fetch_all_pages<T>(&self, path: &str, auth_token: &str) -> Result<Vec<T>, ReportError>
    where
        T: DeserializeOwned,
    {
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let page_path = format!("{}&limit={}&offset={}", path, self.page_size, offset);
            let page: Vec<T> = self.supabase.request(
                Method::GET,
                &page_path,
                Some(auth_token),
                None,
            ).await?;

            let fetched = page.len();
            rows.extend(page);

            if fetched < self.page_size {
                break;
            }
            offset += fetched;
            debug!("Fetched full page of {} rows, continuing at offset {}", fetched, offset);
        }

        Ok(rows)
    }
}
