use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::pipeline::fit::EncodeOptions;
use crate::strava::{AuthSession, StravaClient};
use crate::types::form::ActivityForm;

pub const DEFAULT_ACTIVITY_NAME: &str = "Treadmill walk";

/// Everything one browser tab keeps between requests.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub form: ActivityForm,
    pub activity_name: String,
    pub auth: AuthSession,
    pub uploading: bool,
    pub exchanging: bool,
    last_seen: Instant,
}

impl Default for BrowserSession {
    fn default() -> Self {
        Self {
            form: ActivityForm::default(),
            activity_name: DEFAULT_ACTIVITY_NAME.to_string(),
            auth: AuthSession::default(),
            uploading: false,
            exchanging: false,
            last_seen: Instant::now(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<DashMap<String, BrowserSession>>,
    config: Arc<Config>,
    strava: Option<StravaClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let strava = StravaClient::from_config(&config);
        Self {
            sessions: Arc::new(DashMap::new()),
            config: Arc::new(config),
            strava,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn strava(&self) -> Option<&StravaClient> {
        self.strava.as_ref()
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            sample_step_seconds: self.config.sample_step_seconds,
            ..EncodeOptions::default()
        }
    }

    pub fn insert(&self, session_id: String, session: BrowserSession) {
        self.sessions.insert(session_id, session);
    }

    pub fn get(&self, session_id: &str) -> Option<BrowserSession> {
        self.sessions.get_mut(session_id).map(|mut entry| {
            entry.last_seen = Instant::now();
            entry.clone()
        })
    }

    /// Applies `f` to a session in place, returning its result.
    pub fn update<R>(&self, session_id: &str, f: impl FnOnce(&mut BrowserSession) -> R) -> Option<R> {
        self.sessions.get_mut(session_id).map(|mut entry| {
            entry.last_seen = Instant::now();
            f(&mut entry)
        })
    }

    /// Replaces a session's credentials with the outcome of a completed exchange.
    pub fn store_auth(&self, session_id: &str, auth: AuthSession) -> bool {
        self.update(session_id, |session| session.auth = auth).is_some()
    }

    /// Claims the upload slot of a session. The slot stays taken until the
    /// returned guard drops, including when the request is cancelled.
    pub fn begin_upload(&self, session_id: &str) -> Option<SessionSlot> {
        self.claim(session_id, upload_flag)
    }

    /// Claims the right to run a Strava token exchange for a session.
    pub fn begin_exchange(&self, session_id: &str) -> Option<SessionSlot> {
        self.claim(session_id, exchange_flag)
    }

    fn claim(&self, session_id: &str, flag: SessionFlag) -> Option<SessionSlot> {
        let claimed = self.update(session_id, |session| !std::mem::replace(flag(session), true))?;
        if !claimed {
            return Some(SessionSlot::Busy);
        }
        Some(SessionSlot::Claimed(SlotGuard {
            state: self.clone(),
            session_id: session_id.to_string(),
            flag,
        }))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn evict_expired(&self, ttl: Duration) {
        let now = Instant::now();
        self.sessions.retain(|_, session| {
            session.uploading
                || session.exchanging
                || now.duration_since(session.last_seen) < ttl
        });
        tracing::info!("Session eviction complete. Current size: {}", self.sessions.len());
    }
}

type SessionFlag = fn(&mut BrowserSession) -> &mut bool;

fn upload_flag(session: &mut BrowserSession) -> &mut bool {
    &mut session.uploading
}

fn exchange_flag(session: &mut BrowserSession) -> &mut bool {
    &mut session.exchanging
}

pub enum SessionSlot {
    Claimed(SlotGuard),
    Busy,
}

/// Clears a session flag on drop.
#[must_use = "the slot is released as soon as the guard drops"]
pub struct SlotGuard {
    state: AppState,
    session_id: String,
    flag: SessionFlag,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let flag = self.flag;
        self.state
            .update(&self.session_id, |session| *flag(session) = false);
    }
}
