//! Startup health gate
//!
//! Polls each downstream service until it reports healthy or the retry
//! budget runs out. Running out is only a warning: the orchestrator starts
//! anyway and individual runs fail on their own if a service is still down.

use std::time::Duration;
use tracing::{info, warn};

use super::client::StageClient;

/// A service to wait for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceProbe {
    pub name: String,
    pub health_url: String,
}

impl ServiceProbe {
    pub fn new(name: impl Into<String>, health_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health_url: health_url.into(),
        }
    }
}

/// Result of waiting for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReadiness {
    pub name: String,
    pub healthy: bool,
    pub attempts: u32,
}

/// Wait for every service in order; never fails
pub async fn wait_for_services(
    client: &StageClient,
    services: &[ServiceProbe],
    max_retries: u32,
    delay: Duration,
) -> Vec<ServiceReadiness> {
    let mut report = Vec::with_capacity(services.len());

    for service in services {
        report.push(wait_for_service(client, service, max_retries, delay).await);
    }

    report
}

async fn wait_for_service(
    client: &StageClient,
    service: &ServiceProbe,
    max_retries: u32,
    delay: Duration,
) -> ServiceReadiness {
    let max_retries = max_retries.max(1);

    for attempt in 1..=max_retries {
        if client.is_healthy(&service.health_url).await {
            info!(service = %service.name, attempt, "Service is healthy");
            return ServiceReadiness {
                name: service.name.clone(),
                healthy: true,
                attempts: attempt,
            };
        }

        info!(
            "Waiting for {} (attempt {}/{})...",
            service.name, attempt, max_retries
        );
        if attempt < max_retries {
            tokio::time::sleep(delay).await;
        }
    }

    warn!(
        "{} did not become healthy after {} attempts",
        service.name, max_retries
    );
    ServiceReadiness {
        name: service.name.clone(),
        healthy: false,
        attempts: max_retries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> StageClient {
        StageClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_healthy_service_passes_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let services = [ServiceProbe::new("data-ingestion", format!("{}/health", server.uri()))];
        let report = wait_for_services(&client(), &services, 3, Duration::from_millis(10)).await;

        assert_eq!(
            report,
            vec![ServiceReadiness {
                name: "data-ingestion".to_string(),
                healthy: true,
                attempts: 1,
            }]
        );
    }

    #[tokio::test]
    async fn test_service_recovering_after_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let services = [ServiceProbe::new("data-export", format!("{}/health", server.uri()))];
        let report = wait_for_services(&client(), &services, 5, Duration::from_millis(10)).await;

        assert!(report[0].healthy);
        assert_eq!(report[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_gives_up_without_failing() {
        let services = [
            ServiceProbe::new("data-ingestion", "http://127.0.0.1:1/health"),
            ServiceProbe::new("data-export", "http://127.0.0.1:1/health"),
        ];

        let report = wait_for_services(&client(), &services, 2, Duration::from_millis(10)).await;

        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|r| !r.healthy && r.attempts == 2));
    }
}
