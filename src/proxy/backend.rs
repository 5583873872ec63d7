//! Backend replicas and power-of-two-choices selection.

use crate::config::ConfigError;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use url::Url;

/// One gateway replica behind the load balancer.
#[derive(Debug)]
pub struct Backend {
    pub url: Url,
    /// Host header value for outbound requests, as written in the
    /// configured URL.
    pub host: String,
    /// Requests currently being proxied to this backend. Incremented on
    /// dispatch start, decremented on completion regardless of outcome.
    pub in_flight: AtomicI64,
    pub alive: AtomicBool,
}

impl Backend {
    fn new(url: Url) -> Result<Self, ConfigError> {
        let host_str = url.host_str().ok_or_else(|| ConfigError::Validation {
            field: "proxy.backends".to_string(),
            message: format!("backend URL has no host: {url}"),
        })?;
        let host = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };

        Ok(Self {
            url,
            host,
            in_flight: AtomicI64::new(0),
            alive: AtomicBool::new(true),
        })
    }
}

/// Guard that keeps a backend's in-flight count honest: incremented when
/// created, decremented when dropped, so the count returns to zero whether
/// the proxied call succeeds, fails, or times out.
pub struct InFlightGuard {
    backend: Arc<Backend>,
}

impl InFlightGuard {
    pub fn new(backend: Arc<Backend>) -> Self {
        backend.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { backend }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.backend.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The fixed, statically configured set of backend replicas.
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    cursor: AtomicU64,
}

impl BackendPool {
    /// Parse the configured URL list. Empty input yields an empty pool;
    /// callers that require backends must reject that before serving.
    pub fn from_urls(urls: &[String]) -> Result<Self, ConfigError> {
        let backends = urls
            .iter()
            .map(|raw| {
                let url = Url::parse(raw).map_err(|e| ConfigError::Validation {
                    field: "proxy.backends".to_string(),
                    message: format!("invalid backend URL '{raw}': {e}"),
                })?;
                Ok(Arc::new(Backend::new(url)?))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            backends,
            cursor: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Power-of-two-choices selection.
    ///
    /// The first candidate comes from an advancing round-robin cursor, the
    /// second uniformly at random from the remaining backends. An alive
    /// candidate beats a dead one; otherwise the lower in-flight count wins,
    /// ties favoring the first candidate.
    pub fn choose(&self) -> Option<Arc<Backend>> {
        let n = self.backends.len();
        match n {
            0 => return None,
            1 => return Some(Arc::clone(&self.backends[0])),
            _ => {}
        }

        let i = (self.cursor.fetch_add(1, Ordering::Relaxed) % n as u64) as usize;
        let mut j = rand::thread_rng().gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }

        let a = &self.backends[i];
        let b = &self.backends[j];

        let a_alive = a.alive.load(Ordering::SeqCst);
        let b_alive = b.alive.load(Ordering::SeqCst);
        if a_alive != b_alive {
            return Some(Arc::clone(if a_alive { a } else { b }));
        }

        if a.in_flight.load(Ordering::SeqCst) <= b.in_flight.load(Ordering::SeqCst) {
            Some(Arc::clone(a))
        } else {
            Some(Arc::clone(b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &[&str]) -> BackendPool {
        let urls: Vec<String> = urls.iter().map(|s| s.to_string()).collect();
        BackendPool::from_urls(&urls).unwrap()
    }

    #[test]
    fn empty_pool_never_selects() {
        let pool = pool(&[]);
        assert!(pool.choose().is_none());
    }

    #[test]
    fn single_backend_always_selected() {
        let pool = pool(&["http://replica-1:8080"]);
        for _ in 0..20 {
            assert_eq!(pool.choose().unwrap().host, "replica-1:8080");
        }
    }

    #[test]
    fn invalid_url_is_rejected() {
        let result = BackendPool::from_urls(&["not a url".to_string()]);
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn dead_candidate_loses_to_alive_one() {
        let pool = pool(&["http://replica-1:8080", "http://replica-2:8080"]);
        pool.backends()[0].alive.store(false, Ordering::SeqCst);

        for _ in 0..50 {
            assert_eq!(pool.choose().unwrap().host, "replica-2:8080");
        }
    }

    #[test]
    fn lower_in_flight_wins() {
        let pool = pool(&["http://replica-1:8080", "http://replica-2:8080"]);
        pool.backends()[0].in_flight.store(100, Ordering::SeqCst);

        for _ in 0..50 {
            assert_eq!(pool.choose().unwrap().host, "replica-2:8080");
        }
    }

    #[test]
    fn guard_restores_count_on_drop() {
        let pool = pool(&["http://replica-1:8080"]);
        let backend = pool.choose().unwrap();

        {
            let _g1 = InFlightGuard::new(Arc::clone(&backend));
            let _g2 = InFlightGuard::new(Arc::clone(&backend));
            assert_eq!(backend.in_flight.load(Ordering::SeqCst), 2);
        }

        assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_guards_return_to_zero() {
        let pool = Arc::new(pool(&["http://replica-1:8080", "http://replica-2:8080"]));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let backend = pool.choose().unwrap();
                let _guard = InFlightGuard::new(backend);
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for backend in pool.backends() {
            assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn host_preserves_configured_port() {
        let pool = pool(&["http://replica-1:8080", "http://replica-2"]);
        assert_eq!(pool.backends()[0].host, "replica-1:8080");
        assert_eq!(pool.backends()[1].host, "replica-2");
    }
}
