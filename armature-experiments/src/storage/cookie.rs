//! Cookie-backed participation storage.
//!
//! Records live in a single cookie holding a JSON object of
//! `experiment -> variant | null`. The incoming `Cookie` header is parsed
//! lazily on first access; every mutation re-serialises the whole object
//! into a pending `Set-Cookie` header value that the application copies
//! onto its response.

use super::{Participation, Participations, Storage};
use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Five years, in seconds.
pub const DEFAULT_COOKIE_TTL: u64 = 157_766_400;

/// Default cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "armature_ab";

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Participation cookie configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name
    pub name: String,
    /// Lifetime in seconds; `None` for a session cookie
    pub ttl_secs: Option<u64>,
    /// Cookie path
    pub path: String,
    /// Cookie domain
    pub domain: Option<String>,
    /// Cookie secure flag (HTTPS only)
    pub secure: bool,
    /// Cookie HttpOnly flag
    pub http_only: bool,
    /// Cookie SameSite policy
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            ttl_secs: Some(DEFAULT_COOKIE_TTL),
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookieConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = Some(ttl_secs);
        self
    }

    /// Drop `Expires` and `Max-Age` so the cookie ends with the browser session
    pub fn with_session_lifetime(mut self) -> Self {
        self.ttl_secs = None;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Check the name and that the lifetime yields a representable expiry
    pub fn validate(&self) -> StorageResult<()> {
        if self.name.is_empty() {
            return Err(StorageError::InvalidCookieName);
        }
        self.expires_at(Utc::now()).map(|_| ())
    }

    /// Expiry for a cookie written at `now`; `None` for a session cookie
    pub fn expires_at(&self, now: DateTime<Utc>) -> StorageResult<Option<DateTime<Utc>>> {
        let Some(ttl) = self.ttl_secs else {
            return Ok(None);
        };

        i64::try_from(ttl)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .map(Some)
            .ok_or(StorageError::InvalidTtl(ttl))
    }
}

/// Participation storage persisted in a client-side cookie.
///
/// Once [`mark_headers_sent`](CookieStorage::mark_headers_sent) has been
/// called the cookie can no longer be written and every mutation fails
/// with [`StorageError::HeadersSent`].
///
/// # Examples
///
/// ```
/// use armature_experiments::{CookieConfig, CookieStorage, Participation, Storage};
///
/// let storage = CookieStorage::from_request(
///     CookieConfig::new("ab"),
///     Some("session=abc; ab=%7B%22t1%22%3Anull%7D"),
/// )?;
///
/// assert_eq!(storage.get("t1")?, Some(Participation::Excluded));
///
/// storage.set("t2", Participation::variant("v1"))?;
/// let header = storage.set_cookie_header().unwrap();
/// assert!(header.starts_with("ab="));
/// # Ok::<(), armature_experiments::StorageError>(())
/// ```
#[derive(Debug)]
pub struct CookieStorage {
    config: CookieConfig,
    request_value: Option<String>,
    records: Mutex<Option<Participations>>,
    pending: Mutex<Option<String>>,
    headers_sent: AtomicBool,
}

impl CookieStorage {
    /// Create a storage for a request that carried no cookies
    pub fn new(config: CookieConfig) -> StorageResult<Self> {
        Self::from_request(config, None)
    }

    /// Create a storage from the request's raw `Cookie` header
    pub fn from_request(config: CookieConfig, cookie_header: Option<&str>) -> StorageResult<Self> {
        config.validate()?;

        let request_value = cookie_header.and_then(|header| find_cookie(header, &config.name));

        Ok(Self {
            config,
            request_value,
            records: Mutex::new(None),
            pending: Mutex::new(None),
            headers_sent: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CookieConfig {
        &self.config
    }

    /// Record that the response headers went out; the cookie is frozen from now on
    pub fn mark_headers_sent(&self) {
        self.headers_sent.store(true, Ordering::SeqCst);
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent.load(Ordering::SeqCst)
    }

    /// `Set-Cookie` value produced by the last mutation, if any
    pub fn set_cookie_header(&self) -> Option<String> {
        self.pending.lock().clone()
    }

    /// Take the pending `Set-Cookie` value
    pub fn take_set_cookie_header(&self) -> Option<String> {
        self.pending.lock().take()
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.headers_sent() {
            warn!(cookie = %self.config.name, "Refusing to write participation cookie after headers were sent");
            return Err(StorageError::HeadersSent);
        }
        Ok(())
    }

    fn with_records<R>(&self, f: impl FnOnce(&mut Participations) -> R) -> R {
        let mut guard = self.records.lock();
        let records = guard.get_or_insert_with(|| self.parse_request_value());
        f(records)
    }

    fn parse_request_value(&self) -> Participations {
        let Some(raw) = self.request_value.as_deref() else {
            return Participations::new();
        };

        let decoded = match percent_decode_str(raw).decode_utf8() {
            Ok(decoded) => decoded,
            Err(_) => {
                debug!(cookie = %self.config.name, "Participation cookie is not valid UTF-8, ignoring it");
                return Participations::new();
            }
        };

        match serde_json::from_str::<Participations>(&decoded) {
            Ok(records) => records,
            Err(e) => {
                debug!(cookie = %self.config.name, error = %e, "Participation cookie is malformed, ignoring it");
                Participations::new()
            }
        }
    }

    fn save(&self, records: &Participations) -> StorageResult<()> {
        let json = serde_json::to_string(records)?;
        let value = utf8_percent_encode(&json, NON_ALPHANUMERIC);
        let mut cookie = format!("{}={}", self.config.name, value);

        if let (Some(expires), Some(ttl)) = (
            self.config.expires_at(Utc::now())?,
            self.config.ttl_secs,
        ) {
            cookie.push_str(&format!(
                "; Expires={}; Max-Age={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT"),
                ttl
            ));
        }

        cookie.push_str(&format!("; Path={}", self.config.path));

        if let Some(ref domain) = self.config.domain {
            cookie.push_str(&format!("; Domain={}", domain));
        }

        if self.config.secure {
            cookie.push_str("; Secure");
        }

        if self.config.http_only {
            cookie.push_str("; HttpOnly");
        }

        cookie.push_str(&format!("; SameSite={}", self.config.same_site.as_str()));

        *self.pending.lock() = Some(cookie);
        Ok(())
    }
}

impl Storage for CookieStorage {
    fn has(&self, id: &str) -> StorageResult<bool> {
        validate_identifier(id)?;
        Ok(self.with_records(|records| records.contains_key(id)))
    }

    fn get(&self, id: &str) -> StorageResult<Option<Participation>> {
        validate_identifier(id)?;
        Ok(self.with_records(|records| records.get(id).cloned()))
    }

    fn set(&self, id: &str, participation: Participation) -> StorageResult<()> {
        validate_identifier(id)?;
        if participation.variant_id() == Some("") {
            return Err(StorageError::InvalidParticipation);
        }
        self.ensure_writable()?;

        self.with_records(|records| {
            records.insert(id.to_string(), participation);
            self.save(records)
        })
    }

    fn remove(&self, id: &str) -> StorageResult<Option<Participation>> {
        validate_identifier(id)?;
        self.ensure_writable()?;

        self.with_records(|records| match records.remove(id) {
            Some(removed) => {
                self.save(records)?;
                Ok(Some(removed))
            }
            None => Ok(None),
        })
    }

    fn all(&self) -> StorageResult<Participations> {
        Ok(self.with_records(|records| records.clone()))
    }

    fn clear(&self) -> StorageResult<Participations> {
        self.ensure_writable()?;

        self.with_records(|records| {
            let removed = std::mem::take(records);
            self.save(records)?;
            Ok(removed)
        })
    }
}

fn validate_identifier(id: &str) -> StorageResult<()> {
    if id.is_empty() {
        return Err(StorageError::InvalidIdentifier);
    }
    Ok(())
}

/// Value of cookie `name` in a raw `Cookie` header.
fn find_cookie(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}
