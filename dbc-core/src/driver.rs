//! The driver contract and the process-wide URL-scheme registry.
//!
//! Two distinct things live here, deliberately kept apart:
//!
//! - [`Driver`], a compile-time-typed contract (one concrete
//!   `Connection` type per implementor) that [`crate::pool::Pool`] is
//!   generic over. The pool never downcasts anything: it always holds
//!   `D::Connection` directly.
//! - the runtime registry, a type-erased `Arc<dyn ErasedDriver>` list
//!   keyed by URL scheme, used only by [`connect`] for ad hoc,
//!   dispatch-by-URL connections (grounded on the teacher's
//!   `any::driver` module). A connection obtained this way is downcast
//!   from `Box<dyn Connection>` to its concrete type exactly once, by
//!   the caller, via [`crate::connection::Connection::as_any`] — never
//!   repeatedly in a hot path.

use std::any::Any;
use std::sync::{Arc, Mutex, OnceLock};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::uri::ConnectionUri;

/// A backend implementation, typed by its concrete connection.
///
/// `dbc-kv::RedisDriver`, and the mock drivers in `dbc-relational` and
/// `dbc-document`, each implement this once.
pub trait Driver: Send + Sync + Sized + 'static {
    /// The concrete connection type this driver produces.
    type Connection: Connection;

    /// A short, human-readable name, e.g. `"redis"`.
    fn name(&self) -> &'static str;

    /// URL schemes this driver accepts, e.g. `&["redis", "rediss"]`.
    fn url_schemes(&self) -> &'static [&'static str];

    /// Opens a new physical connection. Called by a [`crate::pool::Pool`]
    /// whenever it needs to grow, and by [`connect`] for unpooled use.
    fn connect(&self, uri: &ConnectionUri) -> Result<Self::Connection>;
}

/// Object-safe wrapper so heterogeneous [`Driver`] implementors can share
/// one registry. Implemented automatically for every [`Driver`].
trait ErasedDriver: Send + Sync {
    fn name(&self) -> &'static str;
    fn url_schemes(&self) -> &'static [&'static str];
    fn connect_boxed(&self, uri: &ConnectionUri) -> Result<Box<dyn Connection>>;
    fn as_any(&self) -> &dyn Any;
}

impl<D: Driver> ErasedDriver for D {
    fn name(&self) -> &'static str {
        Driver::name(self)
    }

    fn url_schemes(&self) -> &'static [&'static str] {
        Driver::url_schemes(self)
    }

    fn connect_boxed(&self, uri: &ConnectionUri) -> Result<Box<dyn Connection>> {
        Ok(Box::new(Driver::connect(self, uri)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Registry {
    drivers: Mutex<Vec<Arc<dyn ErasedDriver>>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        drivers: Mutex::new(Vec::new()),
    })
}

/// Registers `driver` with the process-wide registry, replacing any
/// previously registered driver of the same name. Re-registration is
/// idempotent rather than an error (matching the original's
/// `DriverManager::registerDriver`): the new entry simply takes over the
/// name's schemes.
pub fn register<D: Driver>(driver: D) {
    let entry: Arc<dyn ErasedDriver> = Arc::new(driver);
    let mut drivers = registry().drivers.lock().expect("driver registry poisoned");
    drivers.retain(|d| d.name() != entry.name());
    log::debug!(
        "registered driver {:?} for schemes {:?}",
        entry.name(),
        entry.url_schemes()
    );
    drivers.push(entry);
}

/// Removes the driver named `name`, if any. A no-op for unknown names.
pub fn unregister(name: &str) {
    let mut drivers = registry().drivers.lock().expect("driver registry poisoned");
    drivers.retain(|d| d.name() != name);
}

/// Parses `url` and dispatches to whichever registered driver claims its
/// scheme, opening a new physical connection. The returned connection must
/// be downcast by the caller (via [`Connection::as_any`]) to reach any
/// backend-specific operations.
pub fn connect(url: &str) -> Result<Box<dyn Connection>> {
    let uri = ConnectionUri::parse(url)?;
    let drivers = registry().drivers.lock().expect("driver registry poisoned");
    let driver = drivers
        .iter()
        .find(|d| d.url_schemes().contains(&uri.scheme()))
        .cloned()
        .ok_or_else(|| Error::driver_unavailable(uri.scheme()))?;
    drop(drivers);
    driver.connect_boxed(&uri)
}

/// True if a driver is registered for `scheme`.
pub fn is_registered(scheme: &str) -> bool {
    registry()
        .drivers
        .lock()
        .expect("driver registry poisoned")
        .iter()
        .any(|d| d.url_schemes().contains(&scheme))
}
