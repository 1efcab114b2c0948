use std::time::Duration;
use tracing::{info, warn};

/// Push the current metrics snapshot to a Prometheus Pushgateway.
///
/// Short-lived batch jobs cannot be scraped, so the recorder's rendering is
/// posted once at the end of the run. Failures are logged and otherwise
/// ignored: metrics never decide the outcome of a run.
pub fn push_to_pushgateway(base_url: &str, job: &str, instance: &str) {
    let Some(handle) = crate::metrics::get_handle() else {
        warn!("Metrics recorder not installed, nothing to push");
        return;
    };
    let body = handle.render();
    let url = push_url(base_url, job, instance);

    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build Pushgateway client: {}", e);
            return;
        }
    };

    match client
        .post(&url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
    {
        Ok(r) if r.status().is_success() => {
            info!("Pushed metrics to Pushgateway for instance={}", instance);
        }
        Ok(r) => {
            warn!(
                "Pushgateway push responded with status {} for instance={}",
                r.status().as_u16(),
                instance
            );
        }
        Err(e) => {
            warn!("Failed to push metrics to Pushgateway: {}", e);
        }
    }
}

fn push_url(base_url: &str, job: &str, instance: &str) -> String {
    format!(
        "{}/metrics/job/{}/instance/{}",
        base_url.trim_end_matches('/'),
        job,
        instance
    )
}
