use std::sync::Arc;
use std::sync::atomic::Ordering;

use gtanalyzer::{BatchRequest, Dispatcher, EntityAnalyzer, ProgressStore, WorkerState};
#[cfg(any(feature = "github", feature = "taiga"))]
use gtanalyzer::{ApiRateLimiter, ProgressCallback, http::reqwest_transport::ReqwestTransport};

use crate::config::Config;
use crate::progress::ProgressReporter;
use crate::shutdown;

#[cfg(feature = "github")]
use gtanalyzer::github::{GitHubClient, GitHubError};
#[cfg(feature = "taiga")]
use gtanalyzer::taiga::{TaigaClient, TaigaError};

/// Build a GitHub client from configuration.
///
/// `token` overrides the configured token.
#[cfg(feature = "github")]
pub(crate) fn github_client(
    config: &Config,
    token: Option<&str>,
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<GitHubClient, GitHubError> {
    let transport = ReqwestTransport::with_timeout(config.timeout())
        .map_err(|e| GitHubError::Config(e.to_string()))?;
    let token = token.or(config.github.token.as_deref());

    let client =
        GitHubClient::new_with_transport(&config.github.api_url, token, Arc::new(transport))
            .with_rate_limiter(ApiRateLimiter::new(config.github.requests_per_second))
            .with_retry(config.retry_config());

    Ok(match on_progress {
        Some(cb) => client.with_progress(cb),
        None => client,
    })
}

/// Build a Taiga client from configuration.
///
/// `token` overrides the configured token.
#[cfg(feature = "taiga")]
pub(crate) fn taiga_client(
    config: &Config,
    token: Option<&str>,
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<TaigaClient, TaigaError> {
    let transport = ReqwestTransport::with_timeout(config.timeout())
        .map_err(|e| TaigaError::Config(e.to_string()))?;
    let token = token.or(config.taiga.token.as_deref());

    let client =
        TaigaClient::new_with_transport(&config.taiga.api_url, token, Arc::new(transport))
            .with_rate_limiter(ApiRateLimiter::new(config.taiga.requests_per_second))
            .with_retry(config.retry_config());

    Ok(match on_progress {
        Some(cb) => client.with_progress(cb),
        None => client,
    })
}

/// Dispatch `batch`, wait for it to drain and print its snapshot as JSON.
///
/// A shutdown request cancels the batch after the entity in flight.
pub(crate) async fn run_batch<A: EntityAnalyzer>(
    analyzer: A,
    batch: BatchRequest,
    config: &Config,
    reporter: Arc<ProgressReporter>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(ProgressStore::new(config.store_ttl()));
    let dispatcher = Dispatcher::new(Arc::new(analyzer), Arc::clone(&store))
        .with_progress(reporter.as_callback());

    let (ack, handle) = dispatcher.dispatch(batch)?;
    tracing::debug!(
        request_id = %ack.request_id,
        combinations = ack.combinations,
        "Batch accepted"
    );

    let cancel = handle.cancel_flag();
    let watcher = tokio::spawn(async move {
        shutdown::shutdown_requested().await;
        cancel.store(true, Ordering::Release);
    });

    let report = handle.wait().await;
    watcher.abort();
    reporter.finish();

    if let Some(info) = report.panic_info {
        return Err(format!("analysis worker failed: {info}").into());
    }
    if report.dropped > 0 {
        return Err(format!("{} entity results could not be stored", report.dropped).into());
    }

    let snapshot = store.snapshot(&ack.request_id)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if report.state == WorkerState::Cancelled {
        eprintln!(
            "Cancelled: {} analyzed, {} skipped",
            report.succeeded + report.failed,
            report.cancelled
        );
    }

    Ok(())
}
