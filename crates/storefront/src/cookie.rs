//! Cart identity persisted as a cookie.
//!
//! The only client-side state that outlives a session is the `cart_id`
//! cookie. A [`CookieStore`] holds named values with an expiry; a
//! [`CartIdentity`] wraps one and exposes the cart-specific operations the
//! request client needs.
//!
//! Two stores are provided: [`MemoryCookieStore`] (one process, tests) and
//! [`FileCookieStore`] (a JSON file standing in for a browser profile, used by
//! the CLI).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use market_lane_core::CartId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// Name of the cart identity cookie.
pub const CART_COOKIE: &str = "cart_id";

/// Lifetime of the cart identity cookie in seconds (30 days).
pub const CART_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Lifetime of the cart identity cookie.
#[must_use]
pub fn cart_cookie_max_age() -> TimeDelta {
    TimeDelta::seconds(CART_COOKIE_MAX_AGE_SECS)
}

/// Errors from a cookie store backend.
#[derive(Debug, Error)]
pub enum CookieError {
    /// Reading or writing the backing file failed.
    #[error("Cookie file error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not valid JSON.
    #[error("Cookie file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage for named cookie values with an expiry.
///
/// Implementations must treat expired values as absent.
pub trait CookieStore: Send + Sync {
    /// Read a cookie value, if present and not expired.
    ///
    /// # Errors
    ///
    /// Returns `CookieError` if the backend cannot be read.
    fn get(&self, name: &str) -> Result<Option<String>, CookieError>;

    /// Write a cookie value that expires `max_age` from now.
    ///
    /// # Errors
    ///
    /// Returns `CookieError` if the backend cannot be written.
    fn set(&self, name: &str, value: &str, max_age: TimeDelta) -> Result<(), CookieError>;

    /// Delete a cookie. Deleting a missing cookie is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CookieError` if the backend cannot be written.
    fn remove(&self, name: &str) -> Result<(), CookieError>;
}

/// A stored cookie value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    expires_at: DateTime<Utc>,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Cookie store that lives as long as the process.
pub struct MemoryCookieStore {
    clock: Arc<dyn Clock>,
    cookies: Mutex<HashMap<String, StoredCookie>>,
}

impl MemoryCookieStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cookies: Mutex::new(HashMap::new()),
        }
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Result<Option<String>, CookieError> {
        let now = self.clock.now();
        let mut cookies = self.cookies.lock();
        let live = cookies
            .get(name)
            .filter(|cookie| cookie.is_live(now))
            .map(|cookie| cookie.value.clone());
        if live.is_none() {
            cookies.remove(name);
        }
        Ok(live)
    }

    fn set(&self, name: &str, value: &str, max_age: TimeDelta) -> Result<(), CookieError> {
        let expires_at = self.clock.now() + max_age;
        self.cookies.lock().insert(
            name.to_string(),
            StoredCookie {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), CookieError> {
        self.cookies.lock().remove(name);
        Ok(())
    }
}

// =============================================================================
// File-backed store
// =============================================================================

/// Cookie store persisted as a JSON object in a file.
///
/// Every operation reads the file, so several processes sharing a profile see
/// each other's writes. Expired entries are dropped on the next write.
pub struct FileCookieStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl FileCookieStore {
    /// Create a store backed by `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, StoredCookie>, CookieError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, cookies: &HashMap<String, StoredCookie>) -> Result<(), CookieError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(cookies)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn update(
        &self,
        f: impl FnOnce(&mut HashMap<String, StoredCookie>),
    ) -> Result<(), CookieError> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();
        let mut cookies = self.load()?;
        cookies.retain(|_, cookie| cookie.is_live(now));
        f(&mut cookies);
        self.save(&cookies)
    }
}

impl CookieStore for FileCookieStore {
    fn get(&self, name: &str) -> Result<Option<String>, CookieError> {
        let now = self.clock.now();
        Ok(self
            .load()?
            .remove(name)
            .filter(|cookie| cookie.is_live(now))
            .map(|cookie| cookie.value))
    }

    fn set(&self, name: &str, value: &str, max_age: TimeDelta) -> Result<(), CookieError> {
        let expires_at = self.clock.now() + max_age;
        self.update(|cookies| {
            cookies.insert(
                name.to_string(),
                StoredCookie {
                    value: value.to_string(),
                    expires_at,
                },
            );
        })
    }

    fn remove(&self, name: &str) -> Result<(), CookieError> {
        self.update(|cookies| {
            cookies.remove(name);
        })
    }
}

// =============================================================================
// Cart identity
// =============================================================================

/// The shopper's cart identity, backed by the `cart_id` cookie.
///
/// Backend failures are logged and never surfaced: losing the cookie costs
/// the shopper their cart reference, but must not fail the request that
/// produced it.
#[derive(Clone)]
pub struct CartIdentity {
    store: Arc<dyn CookieStore>,
}

impl CartIdentity {
    /// Wrap a cookie store.
    #[must_use]
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self { store }
    }

    /// The stored cart ID, if any.
    #[must_use]
    pub fn current(&self) -> Option<CartId> {
        match self.store.get(CART_COOKIE) {
            Ok(value) => value.filter(|v| !v.is_empty()).map(CartId::from),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read cart cookie");
                None
            }
        }
    }

    /// Store `cart_id` unless it is already the current identity.
    ///
    /// Returns `true` if the stored value changed.
    pub fn remember(&self, cart_id: &CartId) -> bool {
        if self.current().as_ref() == Some(cart_id) {
            return false;
        }
        match self
            .store
            .set(CART_COOKIE, cart_id.as_str(), cart_cookie_max_age())
        {
            Ok(()) => {
                tracing::debug!(cart_id = %cart_id, "Stored cart identity");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, cart_id = %cart_id, "Failed to store cart cookie");
                false
            }
        }
    }

    /// Delete the stored cart identity.
    pub fn forget(&self) {
        if let Err(e) = self.store.remove(CART_COOKIE) {
            tracing::error!(error = %e, "Failed to delete cart cookie");
        } else {
            tracing::debug!("Cleared cart identity");
        }
    }
}
