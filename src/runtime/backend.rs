//! Process-wide backend initialisation
//!
//! Native inference libraries keep global state (device discovery, thread
//! pools, logging hooks) that must be set up once per process and outlives any
//! individual session. Sessions call [`ensure_initialized`] on every load; only
//! the first call per runtime name reaches the runtime. Releasing a session
//! never tears the backend down. [`shutdown`] exists for embedders that need
//! an explicit teardown and is not called anywhere in this crate.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::ModelRuntime;

static INITIALIZED: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

/// Initialise the backend of `runtime` unless this process already did.
///
/// Safe to call concurrently; a failed initialisation is not recorded, so a
/// later call retries.
pub fn ensure_initialized<R: ModelRuntime + ?Sized>(runtime: &R) -> anyhow::Result<()> {
    let mut initialized = INITIALIZED.lock();
    if initialized.contains(runtime.name()) {
        debug!("Backend '{}' already initialized", runtime.name());
        return Ok(());
    }

    runtime.init_backend()?;
    initialized.insert(runtime.name().to_string());
    info!("Initialized '{}' inference backend", runtime.name());
    Ok(())
}

/// Whether the backend for `name` has been initialised in this process
pub fn is_initialized(name: &str) -> bool {
    INITIALIZED.lock().contains(name)
}

/// Tear down the backend of `runtime`.
///
/// All sessions created from it must already be released. Returns `false`
/// when the backend was not initialised.
pub fn shutdown<R: ModelRuntime + ?Sized>(runtime: &R) -> bool {
    let mut initialized = INITIALIZED.lock();
    if !initialized.remove(runtime.name()) {
        return false;
    }
    runtime.shutdown_backend();
    info!("Shut down '{}' inference backend", runtime.name());
    true
}
