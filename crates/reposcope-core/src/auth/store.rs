use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Store key for the pending PKCE code verifier.
pub const VERIFIER_KEY: &str = "pkce_verifier";
/// Store key for the pending anti-CSRF state token.
pub const STATE_KEY: &str = "oauth_state";

/// Scoped storage for single-use login secrets.
///
/// A verifier and state token live here exactly while a login attempt is
/// in flight; the callback handler consumes them once and deletes them.
/// Values are JSON on the wire so implementations only ever move strings.
pub trait EphemeralStore {
    fn set_raw(&self, key: &str, raw: String);
    fn get_raw(&self, key: &str) -> Option<String>;
    fn remove(&self, key: &str);
    fn clear(&self);

    /// Serialize and store a value under `key`.
    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), serde_json::Error>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw);
        Ok(())
    }

    /// Read and deserialize a value. Missing or malformed data is `None`,
    /// never an error: a corrupt slot reads the same as an absent one.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        let raw = self.get_raw(key)?;
        serde_json::from_str(&raw).ok()
    }
}

/// In-memory store living as long as the process.
///
/// That lifetime is what bounds the CSRF-protection window here: a pending
/// verifier/state cannot outlive the client that created it and is never
/// shared with another process.
#[derive(Debug, Default)]
pub struct MemoryEphemeralStore {
    inner: Mutex<HashMap<String, String>>,
}

impl EphemeralStore for MemoryEphemeralStore {
    fn set_raw(&self, key: &str, raw: String) {
        self.inner.lock().unwrap().insert(key.to_owned(), raw);
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    fn remove(&self, key: &str) {
        self.inner.lock().unwrap().remove(key);
    }

    fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}
