//! Named Connection Registry
//!
//! A thread-safe map of caller-chosen names to live connections. `connect`
//! is idempotent: a healthy existing connection is returned unchanged, a
//! stale one is closed and transparently recreated under the same name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::ConnectParams;
use crate::driver::{self, Driver};
use crate::{Error, Result};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory producing a driver from connection parameters
///
/// Injectable so registry behavior (liveness probes, reconnects) can be
/// exercised against mock drivers.
pub type DriverFactory = Box<dyn Fn(&ConnectParams) -> Result<Box<dyn Driver>> + Send + Sync>;

/// One live connection, addressed by its logical name
pub struct NamedConnection {
    name: String,
    pub(crate) driver: Box<dyn Driver>,
    params: ConnectParams,
    last_used: Instant,
}

impl NamedConnection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameters this connection was created from
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Instant of the last statement or successful probe
    ///
    /// Tracked as an extension point for a future TTL reaper; nothing evicts
    /// idle connections today.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }
}

/// Thread-safe registry of named connections
///
/// All registry operations, including the whole probe/create/replace
/// sequence inside `connect`, run under one mutex, so two threads racing to
/// reconnect the same name cannot both create handles and leak one.
pub struct Registry {
    factory: DriverFactory,
    conns: Mutex<HashMap<String, Arc<Mutex<NamedConnection>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_factory(Box::new(|params: &ConnectParams| driver::open(params)))
    }

    pub fn with_factory(factory: DriverFactory) -> Self {
        Self { factory, conns: Mutex::new(HashMap::new()) }
    }

    /// Create or reuse the connection registered under `name`
    ///
    /// An existing connection is ping-probed: healthy means it is returned
    /// unchanged and `params` is ignored; stale means it is closed
    /// (best-effort) and replaced by a fresh connection from `params`. On a
    /// failed fresh connect no entry remains under `name`.
    pub fn connect(&self, name: &str, params: &ConnectParams) -> Result<Arc<Mutex<NamedConnection>>> {
        let mut conns = lock(&self.conns);

        if let Some(existing) = conns.get(name).cloned() {
            let healthy = {
                let mut conn = lock(&existing);
                match conn.driver.ping() {
                    Ok(()) => {
                        conn.touch();
                        true
                    }
                    Err(e) => {
                        tracing::warn!("Connection '{}' failed liveness probe, reconnecting: {}", name, e);
                        let _ = conn.driver.close();
                        false
                    }
                }
            };
            if healthy {
                return Ok(existing);
            }
            conns.remove(name);
        }

        let driver = (self.factory)(params)?;
        let conn = Arc::new(Mutex::new(NamedConnection {
            name: name.to_string(),
            driver,
            params: params.clone(),
            last_used: Instant::now(),
        }));
        conns.insert(name.to_string(), conn.clone());
        Ok(conn)
    }

    /// Look up an existing connection; never creates one
    pub fn get(&self, name: &str) -> Result<Arc<Mutex<NamedConnection>>> {
        lock(&self.conns)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotConnected(name.to_string()))
    }

    /// Close and remove one connection; unknown names are a no-op
    pub fn close(&self, name: &str) {
        if let Some(conn) = lock(&self.conns).remove(name) {
            let _ = lock(&conn).driver.close();
        }
    }

    /// Close and remove every connection
    pub fn close_all(&self) {
        for (_, conn) in lock(&self.conns).drain() {
            let _ = lock(&conn).driver.close();
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{TabularResult, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Driver that dies when its handle is closed
    struct FlakyDriver {
        closed: bool,
    }

    impl Driver for FlakyDriver {
        fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<TabularResult> {
            Ok(TabularResult::empty())
        }

        fn execute_raw(&mut self, _sql: &str) -> Result<TabularResult> {
            Ok(TabularResult::empty())
        }

        fn ping(&mut self) -> Result<()> {
            if self.closed {
                return Err(Error::Connection("gone away".to_string()));
            }
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn flaky_registry() -> (Registry, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let created_in_factory = created.clone();
        let registry = Registry::with_factory(Box::new(move |_params: &ConnectParams| {
            created_in_factory.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakyDriver { closed: false }) as Box<dyn Driver>)
        }));
        (registry, created)
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (registry, created) = flaky_registry();
        let params = ConnectParams::in_memory();

        let first = registry.connect("default", &params).unwrap();
        let second = registry.connect("default", &params).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_self_healing_reconnect() {
        let (registry, created) = flaky_registry();
        let params = ConnectParams::in_memory();

        let first = registry.connect("default", &params).unwrap();

        // Kill the underlying handle; the next connect must replace it
        lock(&first).driver.close().unwrap();

        let healed = registry.connect("default", &params).unwrap();
        assert!(!Arc::ptr_eq(&first, &healed));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        lock(&healed).driver.ping().unwrap();
    }

    #[test]
    fn test_get_unknown_name() {
        let registry = Registry::new();
        match registry.get("nope") {
            Err(Error::NotConnected(name)) => assert_eq!(name, "nope"),
            other => panic!("expected NotConnected, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_get_never_creates() {
        let (registry, created) = flaky_registry();
        assert!(registry.get("default").is_err());
        assert_eq!(created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_unknown_is_noop() {
        let registry = Registry::new();
        registry.close("nope");
    }

    #[test]
    fn test_close_removes_entry() {
        let (registry, _) = flaky_registry();
        registry.connect("default", &ConnectParams::in_memory()).unwrap();
        registry.close("default");
        assert!(registry.get("default").is_err());
    }

    #[test]
    fn test_close_all() {
        let (registry, _) = flaky_registry();
        registry.connect("a", &ConnectParams::in_memory()).unwrap();
        registry.connect("b", &ConnectParams::in_memory()).unwrap();
        registry.close_all();
        assert!(registry.get("a").is_err());
        assert!(registry.get("b").is_err());
    }

    #[test]
    fn test_last_used_refreshed_on_reuse() {
        let (registry, _) = flaky_registry();
        let params = ConnectParams::in_memory();

        let conn = registry.connect("default", &params).unwrap();
        let before = lock(&conn).last_used();
        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.connect("default", &params).unwrap();
        assert!(lock(&conn).last_used() > before);
    }
}
