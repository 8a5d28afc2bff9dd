use super::SwitchError;
use super::source::{SwitchRegistry, SwitchSource};
use super::switch::SwitchDef;
use crate::sender::HttpClient;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone)]
pub struct PollerOptions {
    pub poll_interval: Duration,
    /// When false only the primer fetch runs.
    pub polling_enabled: bool,
    pub close_timeout: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            polling_enabled: true,
            close_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
pub struct PollerStats {
    fetches: AtomicU64,
    failures: AtomicU64,
}

impl PollerStats {
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Keeps a switch registry eventually consistent with the collector's switch
/// authority by polling `GET {base}/api/switches?domain={domain}`.
pub struct RemoteSwitchSource {
    inner: Arc<RemoteInner>,
}

struct RemoteInner {
    registry: SwitchRegistry,
    client: HttpClient,
    switches_url: Url,
    options: PollerOptions,
    started: AtomicBool,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    stats: PollerStats,
}

impl RemoteSwitchSource {
    pub fn new(
        client: HttpClient,
        domain: &str,
        registry: SwitchRegistry,
        options: PollerOptions,
    ) -> Result<Self, SwitchError> {
        let switches_url = client
            .switches_url(domain)
            .map_err(|e| SwitchError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RemoteInner {
                registry,
                client,
                switches_url,
                options,
                started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
                stats: PollerStats::default(),
            }),
        })
    }

    pub fn stats(&self) -> &PollerStats {
        &self.inner.stats
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops polling and waits, up to the close timeout, for the loop to end.
    pub async fn close(&self) {
        self.stop();

        let task = self.inner.task.lock().take();
        let Some(task) = task else {
            return;
        };

        match tokio::time::timeout(self.inner.options.close_timeout, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => debug!("Switch poll loop ended abnormally: {}", e),
            Err(_) => debug!("Switch poll loop did not stop within close timeout"),
        }
    }
}

impl RemoteInner {
    async fn fetch(&self) -> Result<Vec<SwitchDef>, SwitchError> {
        let start = Instant::now();
        let result = self.client.client.get(self.switches_url.clone()).send().await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.client.stats.record_request(false, start.elapsed());
                return Err(e.into());
            }
        };

        let status = response.status();
        self.client
            .stats
            .record_request(status.is_success(), start.elapsed());
        if !status.is_success() {
            return Err(SwitchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let mut defs: Vec<SwitchDef> = serde_json::from_slice(&body)?;
        defs.iter_mut().for_each(SwitchDef::clamp_level);
        Ok(defs)
    }

    async fn refresh(&self) -> Result<u64, SwitchError> {
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        let outcome = match self.fetch().await {
            Ok(defs) => self.registry.update(&defs),
            Err(e) => Err(e),
        };
        if outcome.is_err() {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    // Failures stay inside the loop; the next tick retries.
    async fn refresh_quietly(&self) {
        match self.refresh().await {
            Ok(version) => debug!(version, "Refreshed switches"),
            Err(e) => debug!("Switch refresh failed, retrying next interval: {}", e),
        }
    }
}

async fn poll_loop(inner: Arc<RemoteInner>, cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = inner.refresh_quietly() => {}
    }

    if !inner.options.polling_enabled {
        return;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(inner.options.poll_interval) => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = inner.refresh_quietly() => {}
        }
    }

    debug!("Switch poll loop stopped");
}

impl SwitchSource for RemoteSwitchSource {
    fn registry(&self) -> &SwitchRegistry {
        &self.inner.registry
    }

    fn start(&self) -> Result<(), SwitchError> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.started.store(false, Ordering::Release);
                return Err(SwitchError::Runtime(e.to_string()));
            }
        };

        info!(
            url = %self.inner.switches_url,
            interval = ?self.inner.options.poll_interval,
            "Starting switch poller"
        );
        let task = handle.spawn(poll_loop(
            Arc::clone(&self.inner),
            self.inner.cancel.clone(),
        ));
        *self.inner.task.lock() = Some(task);
        Ok(())
    }

    fn stop(&self) {
        self.inner.cancel.cancel();
    }

    fn update_async(&self) -> BoxFuture<'_, Result<u64, SwitchError>> {
        self.inner.refresh().boxed()
    }
}

impl Drop for RemoteSwitchSource {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}
