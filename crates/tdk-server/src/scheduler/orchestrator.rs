//! Pipeline orchestrator
//!
//! One run calls the ingestion trigger and, only when ingestion answered
//! HTTP 200, the export trigger. Failures end the run and are logged; they
//! are never retried within the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::client::{health_url, StageClient};
use super::jobs::CronScheduler;
use super::health::{wait_for_services, ServiceProbe};
use super::schedule::DailySchedule;
use crate::config::SchedulerSettings;
use crate::error::PipelineResult;

pub const NIGHTLY_JOB_ID: &str = "nightly_pipeline";
pub const NIGHTLY_JOB_NAME: &str = "Nightly Data Pipeline";

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// Both stages answered; the export status may still be an error
    Completed { ingest_status: u16, export_status: u16 },
    /// Ingestion answered with something other than HTTP 200, export skipped
    IngestRejected { http_status: u16, message: String },
    /// Ingestion could not be reached or did not answer in time
    IngestUnreachable(String),
    /// Export could not be reached or did not answer in time
    ExportUnreachable(String),
    /// Another run was still in flight
    Skipped,
}

/// Clears the in-flight flag when a run ends, however it ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sequences ingestion before export on a daily schedule
pub struct PipelineOrchestrator {
    client: StageClient,
    settings: SchedulerSettings,
    schedule: DailySchedule,
    running: AtomicBool,
}

impl PipelineOrchestrator {
    pub fn new(settings: SchedulerSettings) -> anyhow::Result<Self> {
        let schedule = DailySchedule::new(settings.hour, settings.minute)?;
        let client = StageClient::new(settings.trigger_timeout())?;

        Ok(Self {
            client,
            settings,
            schedule,
            running: AtomicBool::new(false),
        })
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// Execute one ingest -> export run
    pub async fn run_pipeline(&self) -> RunReport {
        let Some(_guard) = self.try_begin() else {
            warn!("Pipeline run already in progress, skipping this one");
            return RunReport::Skipped;
        };

        info!("PIPELINE RUN STARTED");

        info!("Step 1/2: Triggering data ingestion...");
        let ingest = match self.client.trigger(&self.settings.ingestion_url).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Ingestion request failed");
                return RunReport::IngestUnreachable(e.to_string());
            },
        };
        info!("Ingestion result: {} (HTTP {})", ingest.message, ingest.http_status);

        if !ingest.accepted() {
            error!(http_status = ingest.http_status, "Ingestion failed - skipping export");
            return RunReport::IngestRejected {
                http_status: ingest.http_status,
                message: ingest.message,
            };
        }

        info!("Step 2/2: Triggering data export...");
        let export = match self.client.trigger(&self.settings.export_url).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Export request failed");
                return RunReport::ExportUnreachable(e.to_string());
            },
        };
        info!("Export result: {} (HTTP {})", export.message, export.http_status);

        info!("PIPELINE RUN COMPLETED");
        RunReport::Completed {
            ingest_status: ingest.http_status,
            export_status: export.http_status,
        }
    }

    fn health_probes(&self) -> PipelineResult<Vec<ServiceProbe>> {
        Ok(vec![
            ServiceProbe::new("data-ingestion", health_url(&self.settings.ingestion_url)?),
            ServiceProbe::new("data-export", health_url(&self.settings.export_url)?),
        ])
    }

    /// Wait for the stage services, optionally run once, then register the nightly job
    pub async fn start(self: Arc<Self>, scheduler: &CronScheduler) {
        info!(
            ingestion_url = %self.settings.ingestion_url,
            export_url = %self.settings.export_url,
            run_on_startup = self.settings.run_on_startup,
            "Orchestrator starting"
        );

        match self.health_probes() {
            Ok(probes) => {
                wait_for_services(
                    &self.client,
                    &probes,
                    self.settings.health_max_retries,
                    self.settings.health_retry_delay(),
                )
                .await;
            },
            Err(e) => warn!(error = %e, "Cannot derive health URLs, skipping health gate"),
        }

        if self.settings.run_on_startup {
            info!("RUN_ON_STARTUP enabled - running pipeline now");
            let report = self.run_pipeline().await;
            info!(?report, "Startup run finished");
        }

        let orchestrator = Arc::clone(&self);
        scheduler.add_job(NIGHTLY_JOB_ID, NIGHTLY_JOB_NAME, self.schedule.clone(), move || {
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                let report = orchestrator.run_pipeline().await;
                info!(?report, "Scheduled run finished");
            }
        });

        info!(cron = %self.schedule.expression(), "Pipeline scheduled daily at {}", self.schedule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(base: &str) -> SchedulerSettings {
        SchedulerSettings {
            ingestion_url: format!("{}/ingest", base),
            export_url: format!("{}/export", base),
            run_on_startup: false,
            health_max_retries: 2,
            health_retry_delay_secs: 0,
            trigger_timeout_secs: 5,
            ..SchedulerSettings::default()
        }
    }

    async fn mount_ingest(server: &MockServer, status: u16) {
        let outcome = if status == 200 { "success" } else { "error" };
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "status": outcome,
                "message": "ingest done",
                "rows": 0
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_ingest_triggers_export_once() {
        let server = MockServer::start().await;
        mount_ingest(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "message": "Exported 2 rows",
                "rows": 2,
                "file": "20240118_testOutput.txt"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = PipelineOrchestrator::new(settings_for(&server.uri())).unwrap();
        let report = orchestrator.run_pipeline().await;

        assert_eq!(
            report,
            RunReport::Completed {
                ingest_status: 200,
                export_status: 200
            }
        );
    }

    #[tokio::test]
    async fn test_failed_ingest_skips_export() {
        let server = MockServer::start().await;
        mount_ingest(&server, 500).await;
        Mock::given(method("POST"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let orchestrator = PipelineOrchestrator::new(settings_for(&server.uri())).unwrap();
        let report = orchestrator.run_pipeline().await;

        assert_eq!(
            report,
            RunReport::IngestRejected {
                http_status: 500,
                message: "ingest done".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_export_error_still_completes_run() {
        let server = MockServer::start().await;
        mount_ingest(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "status": "error",
                "message": "Query error",
                "rows": 0,
                "file": null
            })))
            .mount(&server)
            .await;

        let orchestrator = PipelineOrchestrator::new(settings_for(&server.uri())).unwrap();

        assert_eq!(
            orchestrator.run_pipeline().await,
            RunReport::Completed {
                ingest_status: 200,
                export_status: 500
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_ingestion_ends_run() {
        let orchestrator = PipelineOrchestrator::new(settings_for("http://127.0.0.1:1")).unwrap();

        let report = orchestrator.run_pipeline().await;

        assert!(matches!(report, RunReport::IngestUnreachable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_export_ends_run() {
        let server = MockServer::start().await;
        mount_ingest(&server, 200).await;

        let mut settings = settings_for(&server.uri());
        settings.export_url = "http://127.0.0.1:1/export".to_string();
        let orchestrator = PipelineOrchestrator::new(settings).unwrap();

        assert!(matches!(
            orchestrator.run_pipeline().await,
            RunReport::ExportUnreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "message": "slow", "rows": 1}))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/export"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "success", "message": "ok"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let orchestrator = PipelineOrchestrator::new(settings_for(&server.uri())).unwrap();
        let (first, second) = tokio::join!(orchestrator.run_pipeline(), orchestrator.run_pipeline());
        let reports = [first, second];

        assert_eq!(reports.iter().filter(|r| **r == RunReport::Skipped).count(), 1);
        assert_eq!(
            reports
                .iter()
                .filter(|r| matches!(r, RunReport::Completed { .. }))
                .count(),
            1
        );

        // The guard is released once the run ends
        assert!(matches!(orchestrator.run_pipeline().await, RunReport::Completed { .. }));
    }

    #[tokio::test]
    async fn test_start_runs_once_and_registers_nightly_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        mount_ingest(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = settings_for(&server.uri());
        settings.run_on_startup = true;
        let orchestrator = Arc::new(PipelineOrchestrator::new(settings).unwrap());
        let scheduler = CronScheduler::new();

        orchestrator.start(&scheduler).await;

        assert_eq!(scheduler.job_ids(), vec![NIGHTLY_JOB_ID]);
        assert_eq!(scheduler.job_name(NIGHTLY_JOB_ID).as_deref(), Some(NIGHTLY_JOB_NAME));
    }

    #[tokio::test]
    async fn test_start_without_startup_run_only_registers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let orchestrator = Arc::new(PipelineOrchestrator::new(settings_for(&server.uri())).unwrap());
        let scheduler = CronScheduler::new();

        // Health checks fail against the mock (no GET route) and the gate gives up
        orchestrator.start(&scheduler).await;

        assert_eq!(scheduler.job_ids(), vec![NIGHTLY_JOB_ID]);
    }
}
