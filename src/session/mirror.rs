//! Session mirror
//!
//! Copies the current identity into a script-readable cookie so the route
//! guard can gate pages without calling the identity provider.

use std::sync::Mutex;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::domain::Account;

/// Mirror cookie read by the route guard
pub const MIRROR_COOKIE: &str = "auth-storage";

/// Provider session cookie
pub const SESSION_COOKIE: &str = "eventcity-session";

/// Lifetime of both cookies
pub const COOKIE_MAX_AGE_DAYS: i64 = 7;

/// Receives every change of the locally held identity.
///
/// Mirroring is fire-and-forget: implementations log failures and never
/// report them.
pub trait SessionMirror: Send + Sync {
    fn mirror(&self, user: Option<&Account>);

    /// Remember (or forget) the provider session token
    fn remember_session(&self, _session_id: Option<&str>) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorState {
    pub user: Option<Account>,
}

/// Cookie payload: `{"state":{"user":...},"version":0}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorEnvelope {
    pub state: MirrorState,
    #[serde(default)]
    pub version: u32,
}

impl MirrorEnvelope {
    pub fn new(user: Option<Account>) -> Self {
        Self {
            state: MirrorState { user },
            version: 0,
        }
    }

    /// Percent-encoded JSON
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(urlencoding::encode(&json).into_owned())
    }

    /// Parse a cookie value; anything malformed reads as no envelope
    pub fn decode(raw: &str) -> Option<Self> {
        let json = urlencoding::decode(raw).ok()?;
        serde_json::from_str(&json).ok()
    }
}

/// The mirrored user in a request's cookies, if any
pub fn read_mirror(jar: &CookieJar) -> Option<Account> {
    jar.get(MIRROR_COOKIE)
        .and_then(|cookie| MirrorEnvelope::decode(cookie.value()))
        .and_then(|envelope| envelope.state.user)
}

/// The provider session token in a request's cookies, if any
pub fn read_session(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn mirror_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((MIRROR_COOKIE, value))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
        .build()
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Mirror writing into the response's cookie jar
#[derive(Debug)]
pub struct CookieMirror {
    jar: Mutex<CookieJar>,
    secure: bool,
}

impl CookieMirror {
    pub fn new(jar: CookieJar, secure: bool) -> Self {
        Self {
            jar: Mutex::new(jar),
            secure,
        }
    }

    fn update(&self, f: impl FnOnce(CookieJar) -> CookieJar) {
        let mut jar = self.jar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *jar = f(jar.clone());
    }

    /// Current jar, including every change made so far
    pub fn jar(&self) -> CookieJar {
        self.jar
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SessionMirror for CookieMirror {
    fn mirror(&self, user: Option<&Account>) {
        let Some(user) = user else {
            self.update(|jar| jar.remove(removal(MIRROR_COOKIE)));
            return;
        };

        match MirrorEnvelope::new(Some(user.clone())).encode() {
            Ok(value) => {
                let cookie = mirror_cookie(value, self.secure);
                self.update(|jar| jar.add(cookie));
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Failed to mirror identity into cookie");
            }
        }
    }

    fn remember_session(&self, session_id: Option<&str>) {
        match session_id {
            Some(id) => {
                let cookie = session_cookie(id.to_string(), self.secure);
                self.update(|jar| jar.add(cookie));
            }
            None => self.update(|jar| jar.remove(removal(SESSION_COOKIE))),
        }
    }
}
