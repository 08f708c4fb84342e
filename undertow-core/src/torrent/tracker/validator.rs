//! Tracker health validation with retries, caching and a bounded worker pool.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use url::Url;

use super::error::TrackerError;
use super::health::{HealthStore, MemoryHealthStore};
use super::probe::{NetworkProbe, TrackerProbe};
use super::rate_limit::UdpRateLimiter;
use super::types::{HealthRecord, ValidationMode, ValidationProgress};
use crate::config::ValidatorConfig;

/// Removes exact duplicates, keeping the first occurrence of each URL.
pub fn unique<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.iter()
        .map(AsRef::as_ref)
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Udp,
    Http,
    WebSocket,
}

/// Checks tracker reachability and filters tracker lists down to healthy ones.
///
/// One validator is meant to be shared; its health store, UDP budget and
/// per-URL locks are what keep concurrent batches consistent.
pub struct TrackerValidator {
    config: ValidatorConfig,
    probe: Arc<dyn TrackerProbe>,
    health: Arc<dyn HealthStore>,
    limiter: Arc<UdpRateLimiter>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Mutable state of one `filter_by_health` batch.
struct Batch {
    queue: VecDeque<String>,
    healthy: Vec<String>,
    checked: usize,
}

impl TrackerValidator {
    /// Creates a validator probing the real network.
    ///
    /// UDP checks draw from the process-wide budget.
    pub fn new(config: ValidatorConfig) -> Self {
        let probe = Arc::new(NetworkProbe::new(config.user_agent));
        let health = Arc::new(MemoryHealthStore::new(config.health_ttl, config.health_capacity));
        let limiter = UdpRateLimiter::process_wide(config.udp_budget, config.udp_window);
        Self {
            config,
            probe,
            health,
            limiter,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn TrackerProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_health_store(mut self, health: Arc<dyn HealthStore>) -> Self {
        self.health = health;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<UdpRateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Checks a single tracker, consulting the health store first.
    ///
    /// Concurrent checks of the same URL are serialized, so the second caller
    /// observes the verdict the first one stored. Rate-limited verdicts are
    /// returned but never stored.
    pub async fn check_tracker(&self, url: &str, mode: ValidationMode) -> HealthRecord {
        if mode == ValidationMode::Off {
            return HealthRecord::healthy(url);
        }

        let lock = self.url_lock(url);
        let record = {
            let _guard = lock.lock().await;
            match self.health.get(url) {
                Some(record) => {
                    debug!("Health cache hit for {url}: ok={}", record.ok);
                    record
                }
                None => self.check_uncached(url, mode).await,
            }
        };
        self.release_url_lock(url, lock);
        record
    }

    async fn check_uncached(&self, url: &str, mode: ValidationMode) -> HealthRecord {
        match self.check_with_retries(url, mode).await {
            Ok(()) => {
                debug!("Tracker {url} is healthy ({mode})");
                let record = HealthRecord::healthy(url);
                self.health.set(record.clone());
                record
            }
            Err(e) if e.is_local() => {
                debug!("Tracker {url} skipped: {e}");
                HealthRecord::unhealthy(url, &e)
            }
            Err(e) => {
                debug!("Tracker {url} is unhealthy: {e}");
                let record = HealthRecord::unhealthy(url, &e);
                self.health.set(record.clone());
                record
            }
        }
    }

    async fn check_with_retries(&self, url: &str, mode: ValidationMode) -> Result<(), TrackerError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let error = match self.check_once(url, mode).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let retryable = matches!(
                error,
                TrackerError::Dns { .. } | TrackerError::Http { .. } | TrackerError::Udp { .. }
            );
            if !retryable || attempt + 1 >= attempts {
                return Err(error);
            }

            let backoff = self.config.backoff_base * 2u32.saturating_pow(attempt);
            debug!(
                "Attempt {} for {url} failed ({}), retrying in {}ms",
                attempt + 1,
                error.tag(),
                backoff.as_millis()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn check_once(&self, url: &str, mode: ValidationMode) -> Result<(), TrackerError> {
        let no_host = || TrackerError::NoHost {
            url: url.to_string(),
        };

        let parsed = Url::parse(url).map_err(|_| no_host())?;
        let scheme = match parsed.scheme() {
            "udp" => Scheme::Udp,
            "http" | "https" => Scheme::Http,
            "ws" | "wss" => Scheme::WebSocket,
            other => {
                return Err(TrackerError::UnsupportedScheme {
                    scheme: other.to_string(),
                });
            }
        };
        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(no_host)?
            .trim_start_matches('[')
            .trim_end_matches(']');
        let port = parsed.port_or_known_default().unwrap_or(80);

        let addrs = self
            .probe
            .resolve(host, port, self.config.dns_timeout)
            .await?;

        match (scheme, mode) {
            (Scheme::Http, ValidationMode::Aggressive) => {
                if self.probe.http_reachable(url, self.config.http_timeout).await.is_ok() {
                    return Ok(());
                }
                self.probe
                    .http_reachable(url, self.config.aggressive_http_timeout)
                    .await
            }
            (Scheme::Http, _) => self.probe.http_reachable(url, self.config.http_timeout).await,
            (Scheme::Udp, ValidationMode::Aggressive) => {
                let addr = addrs.first().copied().ok_or_else(|| TrackerError::Dns {
                    host: host.to_string(),
                    reason: "no addresses".into(),
                })?;
                self.udp_check(url, addr).await
            }
            _ => Ok(()),
        }
    }

    async fn udp_check(&self, url: &str, addr: SocketAddr) -> Result<(), TrackerError> {
        if !self.limiter.try_acquire() {
            warn!("UDP budget exhausted, not checking {url}");
            return Err(TrackerError::RateLimited);
        }
        self.probe
            .udp_handshake(url, addr, self.config.udp_timeout)
            .await
    }

    fn url_lock(&self, url: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.in_flight.lock().entry(url.to_string()).or_default())
    }

    fn release_url_lock(&self, url: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut table = self.in_flight.lock();
        // Table entry plus ours: nobody else is waiting.
        if Arc::strong_count(&lock) <= 2 {
            table.remove(url);
        }
    }

    /// Filters `urls` down to healthy trackers.
    ///
    /// See [`filter_by_health_with_progress`](Self::filter_by_health_with_progress).
    pub async fn filter_by_health<S: AsRef<str>>(
        &self,
        urls: &[S],
        mode: ValidationMode,
        limit: usize,
    ) -> Vec<String> {
        self.filter_by_health_with_progress(urls, mode, limit, None)
            .await
    }

    /// Filters `urls` down to healthy trackers, reporting each completed check.
    ///
    /// `Off` returns the input as-is (cut to `limit` when non-zero). Other
    /// modes deduplicate the input and drain it with up to `workers`
    /// concurrent checks. With `limit > 0`, workers stop taking new URLs once
    /// that many healthy trackers are found; the remaining URLs are left
    /// unchecked. The result is ordered by completion, not input position.
    pub async fn filter_by_health_with_progress<S: AsRef<str>>(
        &self,
        urls: &[S],
        mode: ValidationMode,
        limit: usize,
        progress: Option<&UnboundedSender<ValidationProgress>>,
    ) -> Vec<String> {
        if mode == ValidationMode::Off {
            let take = if limit > 0 { limit } else { urls.len() };
            return urls
                .iter()
                .take(take)
                .map(|url| url.as_ref().to_string())
                .collect();
        }

        let queue: VecDeque<String> = unique(urls).into();
        let total = queue.len();
        if total == 0 {
            return Vec::new();
        }

        let batch = Mutex::new(Batch {
            queue,
            healthy: Vec::new(),
            checked: 0,
        });
        let limit_reached = move |batch: &Batch| limit > 0 && batch.healthy.len() >= limit;
        let shared = &batch;

        let worker = || async move {
            loop {
                let url = {
                    let mut state = shared.lock();
                    if limit_reached(&state) {
                        break;
                    }
                    match state.queue.pop_front() {
                        Some(url) => url,
                        None => break,
                    }
                };

                let record = self.check_tracker(&url, mode).await;

                let mut state = shared.lock();
                state.checked += 1;
                if record.ok && !limit_reached(&state) {
                    state.healthy.push(url.clone());
                }
                if let Some(progress) = progress {
                    // Receiver may be gone; progress is best-effort.
                    let _ = progress.send(ValidationProgress {
                        url,
                        ok: record.ok,
                        checked: state.checked,
                        healthy: state.healthy.len(),
                        total,
                    });
                }
            }
        };

        let workers = self.config.workers.clamp(1, total);
        join_all((0..workers).map(|_| worker())).await;

        let state = batch.into_inner();
        info!(
            "Validated trackers ({mode}): {} healthy of {} checked, {total} submitted",
            state.healthy.len(),
            state.checked
        );
        state.healthy
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;
    use tokio::sync::mpsc;

    use super::*;

    /// Probe with outcomes scripted per host.
    #[derive(Default)]
    struct ScriptedProbe {
        dns_down: HashSet<String>,
        http_down: HashSet<String>,
        udp_down: HashSet<String>,
        /// Host -> number of leading resolve failures before success
        flaky: Mutex<HashMap<String, usize>>,
        delay: Duration,
        resolves: AtomicUsize,
        http_checks: AtomicUsize,
        handshakes: AtomicUsize,
    }

    fn host_of(url: &str) -> String {
        Url::parse(url).unwrap().host_str().unwrap().to_string()
    }

    #[async_trait]
    impl TrackerProbe for ScriptedProbe {
        async fn resolve(
            &self,
            host: &str,
            port: u16,
            _limit: Duration,
        ) -> Result<Vec<SocketAddr>, TrackerError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let dns_error = || TrackerError::Dns {
                host: host.to_string(),
                reason: "scripted".into(),
            };
            if self.dns_down.contains(host) {
                return Err(dns_error());
            }
            if let Some(left) = self.flaky.lock().get_mut(host).filter(|left| **left > 0) {
                *left -= 1;
                return Err(dns_error());
            }
            Ok(vec![SocketAddr::from(([127, 0, 0, 1], port))])
        }

        async fn http_reachable(&self, url: &str, _limit: Duration) -> Result<(), TrackerError> {
            self.http_checks.fetch_add(1, Ordering::SeqCst);
            if self.http_down.contains(&host_of(url)) {
                return Err(TrackerError::Http {
                    url: url.to_string(),
                    reason: "status 503".into(),
                });
            }
            Ok(())
        }

        async fn udp_handshake(
            &self,
            url: &str,
            _addr: SocketAddr,
            _limit: Duration,
        ) -> Result<(), TrackerError> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            if self.udp_down.contains(&host_of(url)) {
                return Err(TrackerError::Udp {
                    url: url.to_string(),
                    reason: "timeout".into(),
                });
            }
            Ok(())
        }
    }

    fn hosts(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn validator(probe: Arc<ScriptedProbe>, workers: usize) -> TrackerValidator {
        let config = ValidatorConfig {
            workers,
            ..ValidatorConfig::default()
        };
        TrackerValidator::new(config)
            .with_probe(probe)
            .with_rate_limiter(Arc::new(UdpRateLimiter::new(20, Duration::from_secs(60))))
    }

    #[tokio::test]
    async fn test_off_mode_is_identity() {
        let probe = Arc::new(ScriptedProbe::default());
        let v = validator(probe.clone(), 8);
        let urls = ["udp://a:1", "udp://a:1", "http://nope/announce", "garbage"];

        assert_eq!(v.filter_by_health(&urls, ValidationMode::Off, 0).await, urls);
        assert_eq!(
            v.filter_by_health(&urls, ValidationMode::Off, 2).await,
            &urls[..2]
        );
        assert_eq!(probe.resolves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_mode_failure_tags() {
        let probe = Arc::new(ScriptedProbe {
            dns_down: hosts(&["gone.example"]),
            http_down: hosts(&["dead.example"]),
            ..Default::default()
        });
        let v = validator(probe.clone(), 8);

        let ok = v.check_tracker("udp://alive.example:6969", ValidationMode::Basic).await;
        assert!(ok.ok);
        assert_eq!(probe.handshakes.load(Ordering::SeqCst), 0);

        let dns = v.check_tracker("udp://gone.example:80", ValidationMode::Basic).await;
        assert_eq!(dns.last_error.as_deref(), Some("dns"));

        let http = v
            .check_tracker("http://dead.example/announce", ValidationMode::Basic)
            .await;
        assert_eq!(http.last_error.as_deref(), Some("http"));

        let no_host = v.check_tracker("not a url", ValidationMode::Basic).await;
        assert_eq!(no_host.last_error.as_deref(), Some("no-host"));

        let scheme = v.check_tracker("ftp://files.example/x", ValidationMode::Basic).await;
        assert_eq!(scheme.last_error.as_deref(), Some("scheme"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_exponential_backoff() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.flaky.lock().insert("flaky.example".into(), 2);
        let v = validator(probe.clone(), 8);

        let started = tokio::time::Instant::now();
        let record = v.check_tracker("udp://flaky.example:80", ValidationMode::Basic).await;

        assert!(record.ok);
        assert_eq!(probe.resolves.load(Ordering::SeqCst), 3);
        // 300ms + 600ms between the three attempts.
        assert!(started.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_attempts() {
        let probe = Arc::new(ScriptedProbe::default());
        probe.flaky.lock().insert("flaky.example".into(), 5);
        let v = validator(probe.clone(), 8);

        let record = v.check_tracker("udp://flaky.example:80", ValidationMode::Basic).await;
        assert!(!record.ok);
        assert_eq!(probe.resolves.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verdicts_are_cached() {
        let probe = Arc::new(ScriptedProbe {
            dns_down: hosts(&["gone.example"]),
            ..Default::default()
        });
        let v = validator(probe.clone(), 8);

        for _ in 0..3 {
            assert!(v.check_tracker("udp://up.example:1", ValidationMode::Basic).await.ok);
            assert!(!v.check_tracker("udp://gone.example:1", ValidationMode::Basic).await.ok);
        }
        // One resolve for the healthy URL, three attempts for the dead one.
        assert_eq!(probe.resolves.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_checks_of_same_url_probe_once() {
        let probe = Arc::new(ScriptedProbe {
            delay: Duration::from_millis(100),
            ..Default::default()
        });
        let v = validator(probe.clone(), 8);

        let (a, b) = tokio::join!(
            v.check_tracker("udp://same.example:1", ValidationMode::Basic),
            v.check_tracker("udp://same.example:1", ValidationMode::Basic),
        );
        assert_eq!(a.ok, b.ok);
        assert_eq!(probe.resolves.load(Ordering::SeqCst), 1);
        assert!(v.in_flight.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_excludes_unhealthy_and_dedupes() {
        let probe = Arc::new(ScriptedProbe {
            http_down: hosts(&["dead.example"]),
            ..Default::default()
        });
        let v = validator(probe.clone(), 8);
        let urls = [
            "http://up.example/announce",
            "http://dead.example/announce",
            "http://up.example/announce",
            "udp://other.example:80",
        ];

        let mut healthy = v.filter_by_health(&urls, ValidationMode::Basic, 0).await;
        healthy.sort();
        assert_eq!(healthy, vec!["http://up.example/announce", "udp://other.example:80"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_stops_pulling_work() {
        let probe = Arc::new(ScriptedProbe::default());
        let v = validator(probe.clone(), 1);
        let urls: Vec<String> = (0..10).map(|i| format!("udp://t{i}.example:80")).collect();

        let healthy = v.filter_by_health(&urls, ValidationMode::Basic, 2).await;
        assert_eq!(healthy, &urls[..2]);
        assert_eq!(probe.resolves.load(Ordering::SeqCst), 2);

        let wide = validator(Arc::new(ScriptedProbe::default()), 8);
        let healthy = wide.filter_by_health(&urls, ValidationMode::Basic, 3).await;
        assert_eq!(healthy.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_udp_budget_rejects_without_handshake() {
        let probe = Arc::new(ScriptedProbe::default());
        let v = validator(probe.clone(), 8);
        let urls: Vec<String> = (0..21).map(|i| format!("udp://t{i}.example:80")).collect();

        let healthy = v.filter_by_health(&urls, ValidationMode::Aggressive, 0).await;
        assert_eq!(healthy.len(), 20);
        assert_eq!(probe.handshakes.load(Ordering::SeqCst), 20);

        let rejected = urls.iter().find(|u| !healthy.contains(u)).unwrap();
        let record = v.check_tracker(rejected, ValidationMode::Aggressive).await;
        assert_eq!(record.last_error.as_deref(), Some("rate-limited"));
        assert!(v.health.get(rejected).is_none());

        // Budget comes back after the window.
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(v.check_tracker(rejected, ValidationMode::Aggressive).await.ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aggressive_udp_failure() {
        let probe = Arc::new(ScriptedProbe {
            udp_down: hosts(&["mute.example"]),
            ..Default::default()
        });
        let v = validator(probe.clone(), 8);

        let record = v.check_tracker("udp://mute.example:80", ValidationMode::Aggressive).await;
        assert_eq!(record.last_error.as_deref(), Some("udp"));
        assert_eq!(probe.handshakes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let probe = Arc::new(ScriptedProbe {
            dns_down: hosts(&["b.example"]),
            ..Default::default()
        });
        let v = validator(probe, 2);
        let urls = ["udp://a.example:1", "udp://b.example:1", "udp://c.example:1"];
        let (tx, mut rx) = mpsc::unbounded_channel();

        v.filter_by_health_with_progress(&urls, ValidationMode::Basic, 0, Some(&tx))
            .await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.total == 3));
        let last = events.last().unwrap();
        assert_eq!((last.checked, last.healthy), (3, 2));
    }

    #[tokio::test]
    async fn test_dropped_progress_receiver_is_ignored() {
        let v = validator(Arc::new(ScriptedProbe::default()), 8);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let healthy = v
            .filter_by_health_with_progress(&["udp://a.example:1"], ValidationMode::Basic, 0, Some(&tx))
            .await;
        assert_eq!(healthy.len(), 1);
    }

    #[test]
    fn test_unique_keeps_first_occurrence() {
        assert_eq!(
            unique(&["b", "a", "b", "c", "a"]),
            vec!["b".to_string(), "a".into(), "c".into()]
        );
        assert!(unique::<&str>(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_unique_is_order_preserving_dedup(urls in proptest::collection::vec("[a-d]{1,2}", 0..20)) {
            let out = unique(&urls);
            let distinct: HashSet<&String> = urls.iter().collect();
            prop_assert_eq!(out.len(), distinct.len());

            let mut expected = Vec::new();
            for url in &urls {
                if !expected.contains(url) {
                    expected.push(url.clone());
                }
            }
            prop_assert_eq!(out, expected);
        }
    }
}
