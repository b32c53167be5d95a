//! Authenticated sessions for dashboards behind a login.
//!
//! The application keeps its tokens in `localStorage` under `accessToken` and
//! `refreshToken`. Seeding writes them into the loaded origin so a reload
//! renders the dashboard as the signed-in user.

use crate::capture::run_script;
use crate::{Engine, Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

const SEED: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        let stored = 0;
        args.entries.forEach(function(entry){
            window.localStorage.setItem(entry[0], entry[1]);
            stored++;
        });
        return JSON.stringify({ stored: stored });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

const CLEAR: &str = r#"(function(){
    try {
        const args = {{ARGS}};
        args.keys.forEach(function(key){ window.localStorage.removeItem(key); });
        return JSON.stringify(true);
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()"#;

/// Holds the tokens a session is seeded from.
pub trait TokenStore {
    fn access_token(&self) -> Option<&str>;

    fn refresh_token(&self) -> Option<&str>;

    fn set_tokens(&mut self, access: String, refresh: Option<String>);

    fn clear(&mut self);
}

/// A [`TokenStore`] that lives only as long as the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTokenStore {
    access: Option<String>,
    refresh: Option<String>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access: impl Into<String>, refresh: Option<String>) -> Self {
        let mut store = Self::new();
        store.set_tokens(access.into(), refresh);
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<&str> {
        self.access.as_deref()
    }

    fn refresh_token(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    fn set_tokens(&mut self, access: String, refresh: Option<String>) {
        self.access = Some(access).filter(|t| !t.is_empty());
        self.refresh = refresh.filter(|t| !t.is_empty());
    }

    fn clear(&mut self) {
        self.access = None;
        self.refresh = None;
    }
}

/// What the page says after seeding. Older builds reply with a bare flag.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedReply {
    Count { stored: usize },
    Flag(bool),
}

impl SeedReply {
    fn stored(self, requested: usize) -> usize {
        match self {
            SeedReply::Count { stored } => stored,
            SeedReply::Flag(true) => requested,
            SeedReply::Flag(false) => 0,
        }
    }
}

#[derive(Serialize)]
struct SeedArgs<'a> {
    entries: Vec<(&'a str, &'a str)>,
}

#[derive(Serialize)]
struct ClearArgs<'a> {
    keys: &'a [&'a str],
}

/// Write the store's tokens into the current origin's `localStorage`.
///
/// Returns how many keys were stored. The page must already be on the
/// application's origin; reload it afterwards so the app picks them up.
pub fn seed<E: Engine>(engine: &mut E, store: &dyn TokenStore) -> Result<usize> {
    let mut entries = Vec::with_capacity(2);
    if let Some(token) = store.access_token() {
        entries.push((ACCESS_TOKEN_KEY, token));
    }
    if let Some(token) = store.refresh_token() {
        entries.push((REFRESH_TOKEN_KEY, token));
    }
    if entries.is_empty() {
        warn!("token store is empty, session not seeded");
        return Ok(0);
    }

    let requested = entries.len();
    let reply: SeedReply = run_script(engine, SEED, &SeedArgs { entries }, false)
        .map_err(|e| Error::ScriptError(format!("could not seed session: {}", e)))?;
    let stored = reply.stored(requested);
    debug!("seeded {} of {} session keys", stored, requested);
    Ok(stored)
}

/// Remove the session keys from the current origin.
pub fn clear<E: Engine>(engine: &mut E) -> Result<()> {
    run_script::<_, _, serde_json::Value>(
        engine,
        CLEAR,
        &ClearArgs {
            keys: &[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY],
        },
        false,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, Region, ScriptResult};

    struct StorageEngine {
        reply: String,
        threw: bool,
        last_script: String,
    }

    impl Engine for StorageEngine {
        fn new(_config: EngineConfig) -> Result<Self> {
            Ok(Self {
                reply: String::new(),
                threw: false,
                last_script: String::new(),
            })
        }

        fn load_url(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        fn evaluate(&mut self, script: &str, _await_promise: bool) -> Result<ScriptResult> {
            self.last_script = script.to_string();
            Ok(ScriptResult {
                value: self.reply.clone(),
                is_error: self.threw,
            })
        }

        fn capture_region(&mut self, _clip: Region, _scale: f64) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    fn engine(reply: &str) -> StorageEngine {
        StorageEngine {
            reply: reply.to_string(),
            threw: false,
            last_script: String::new(),
        }
    }

    #[test]
    fn memory_store_drops_empty_tokens() {
        let mut store = MemoryTokenStore::with_tokens("abc", Some(String::new()));
        assert_eq!(store.access_token(), Some("abc"));
        assert_eq!(store.refresh_token(), None);
        store.clear();
        assert_eq!(store.access_token(), None);
    }

    #[test]
    fn seeds_both_tokens() {
        let store = MemoryTokenStore::with_tokens("a.b.c", Some("r-1".into()));
        let mut e = engine(r#"{"stored":2}"#);
        assert_eq!(seed(&mut e, &store).unwrap(), 2);
        assert!(e
            .last_script
            .contains(r#"{"entries":[["accessToken","a.b.c"],["refreshToken","r-1"]]}"#));
    }

    #[test]
    fn bare_flag_replies_are_accepted() {
        let store = MemoryTokenStore::with_tokens("a", None);
        assert_eq!(seed(&mut engine("true"), &store).unwrap(), 1);
        assert_eq!(seed(&mut engine("false"), &store).unwrap(), 0);
    }

    #[test]
    fn empty_store_skips_the_page() {
        let mut e = engine("{}");
        assert_eq!(seed(&mut e, &MemoryTokenStore::new()).unwrap(), 0);
        assert!(e.last_script.is_empty());
    }

    #[test]
    fn storage_errors_surface() {
        let store = MemoryTokenStore::with_tokens("a", None);
        let err = seed(&mut engine(r#"{"error":"SecurityError"}"#), &store).unwrap_err();
        assert!(err.to_string().contains("SecurityError"));
    }

    #[test]
    fn thrown_exceptions_surface_as_script_errors() {
        let store = MemoryTokenStore::with_tokens("a", None);
        let mut e = engine("ReferenceError: localStorage is not defined");
        e.threw = true;
        match seed(&mut e, &store).unwrap_err() {
            Error::ScriptError(msg) => assert!(msg.contains("ReferenceError")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
