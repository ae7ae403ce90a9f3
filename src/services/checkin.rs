//! Guest check-in session
//!
//! Turns decoded text into session state:
//! - valid identifier: `waiting -> success`, identifier persisted
//! - anything else: stays `waiting` with the invalid flag set
//! - capture failure / recovery: `waiting <-> error`
//! - reset: `success -> waiting`, identifier cleared

use crate::domain::{GuestId, GuestIdError};
use crate::infra::metrics::Metrics;
use crate::infra::store::StateStore;
use crate::io::analytics::{AnalyticsSender, ScanCategory};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Guest-facing session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Scanning, no identifier accepted yet
    Waiting,
    /// Identifier accepted and shown as a pass
    Success(GuestId),
    /// Capture pipeline failed
    Error,
}

impl SessionState {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionState::Waiting => SessionKind::Waiting,
            SessionState::Success(_) => SessionKind::Success,
            SessionState::Error => SessionKind::Error,
        }
    }
}

/// State discriminant for views and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Waiting,
    Success,
    Error,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Waiting => "waiting",
            SessionKind::Success => "success",
            SessionKind::Error => "error",
        }
    }
}

/// What happened to one decoded string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Accepted(GuestId),
    Rejected(GuestIdError),
    /// A pass is already displayed
    Ignored,
}

pub struct CheckinSession {
    state: SessionState,
    invalid: bool,
    session_id: Uuid,
    store: StateStore,
    analytics: Option<AnalyticsSender>,
    metrics: Arc<Metrics>,
}

impl CheckinSession {
    pub fn new(store: StateStore, analytics: Option<AnalyticsSender>, metrics: Arc<Metrics>) -> Self {
        Self {
            state: SessionState::Waiting,
            invalid: false,
            session_id: Uuid::now_v7(),
            store,
            analytics,
            metrics,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn invalid(&self) -> bool {
        self.invalid
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn guest_id(&self) -> Option<&GuestId> {
        match &self.state {
            SessionState::Success(id) => Some(id),
            _ => None,
        }
    }

    /// The capture feed is only needed until a pass is accepted
    pub fn camera_active(&self) -> bool {
        !matches!(self.state, SessionState::Success(_))
    }

    /// Validate one decoded string
    pub fn handle_scan(&mut self, raw: &str) -> ScanOutcome {
        if !self.camera_active() {
            self.metrics.record_scan_ignored();
            debug!(len = raw.len(), "scan_ignored_pass_displayed");
            return ScanOutcome::Ignored;
        }

        match GuestId::parse(raw) {
            Ok(id) => {
                self.store.set_guest_id(&id);
                self.state = SessionState::Success(id.clone());
                self.metrics.record_scan_accepted();
                self.emit(ScanCategory::ScanSuccess, raw);
                info!(guest_id = %id, session = %self.session_id, "scan_accepted");
                ScanOutcome::Accepted(id)
            }
            Err(reason) => {
                self.invalid = true;
                // Any decode proves the feed works again
                if self.state == SessionState::Error {
                    self.state = SessionState::Waiting;
                }
                self.metrics.record_scan_rejected();
                self.emit(ScanCategory::ScanRejected, raw);
                info!(text = %raw, reason = %reason, "scan_rejected");
                ScanOutcome::Rejected(reason)
            }
        }
    }

    fn emit(&self, category: ScanCategory, label: &str) {
        if let Some(ref analytics) = self.analytics {
            analytics.send_scan(self.session_id, category, label);
        }
    }

    /// "Start over": forget the pass and scan again
    ///
    /// Returns true if a pass was displayed.
    pub fn reset(&mut self) -> bool {
        let had_pass = !self.camera_active();
        self.store.clear_guest_id();
        self.invalid = false;
        self.state = SessionState::Waiting;
        self.session_id = Uuid::now_v7();
        info!(session = %self.session_id, had_pass = had_pass, "session_reset");
        had_pass
    }

    pub fn capture_failed(&mut self) {
        if self.state == SessionState::Waiting {
            self.state = SessionState::Error;
        }
    }

    pub fn capture_recovered(&mut self) {
        if self.state == SessionState::Error {
            self.state = SessionState::Waiting;
        }
    }
}
