// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A session wired to a mock server and an event recorder.
//!
//! ## Design Principles
//!
//! - One call sets up session, server handle and observers
//! - The health daemon stays quiet unless a test asks for it
//! - Server pushes are asynchronous; [`SessionHarness::settle`] lets the
//!   session's event pump catch up

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use trap_opcda::{
    DataChangedEvent, DataItem, ErrorEvent, LogEvent, NotificationHub, ResultCode, Session,
    SessionConfig,
};

use super::fixtures::ConfigFixtures;
use super::mocks::{MockProtocolClient, MOCK_HOST, MOCK_SERVER};

// =============================================================================
// Event Recorder
// =============================================================================

/// Records every notification raised by a hub.
#[derive(Clone, Default)]
pub struct EventRecorder {
    data: Arc<Mutex<Vec<DataChangedEvent>>>,
    errors: Arc<Mutex<Vec<ErrorEvent>>>,
    logs: Arc<Mutex<Vec<LogEvent>>>,
}

impl EventRecorder {
    /// Creates a recorder registered on all three channels of `hub`.
    pub fn attach(hub: &NotificationHub) -> Self {
        let recorder = Self::default();

        let data = Arc::clone(&recorder.data);
        hub.on_data_changed(move |event| data.lock().push(event.clone()));
        let errors = Arc::clone(&recorder.errors);
        hub.on_error(move |event| errors.lock().push(event.clone()));
        let logs = Arc::clone(&recorder.logs);
        hub.on_log(move |event| logs.lock().push(event.clone()));

        recorder
    }

    /// Returns the recorded data-changed events.
    pub fn data_events(&self) -> Vec<DataChangedEvent> {
        self.data.lock().clone()
    }

    /// Returns the recorded error events.
    pub fn error_events(&self) -> Vec<ErrorEvent> {
        self.errors.lock().clone()
    }

    /// Returns the recorded log messages.
    pub fn log_messages(&self) -> Vec<String> {
        self.logs.lock().iter().map(|event| event.message.clone()).collect()
    }

    /// Returns the codes of data-changed events for `item`, in order.
    pub fn data_codes_for(&self, item: &str) -> Vec<ResultCode> {
        self.data
            .lock()
            .iter()
            .filter(|event| event.item.name == item)
            .map(|event| event.code)
            .collect()
    }

    /// Returns the codes of all error events, in order.
    pub fn error_codes(&self) -> Vec<ResultCode> {
        self.errors.lock().iter().map(|event| event.code).collect()
    }

    /// Counts data-changed events with `code`.
    pub fn count_data(&self, code: ResultCode) -> usize {
        self.data.lock().iter().filter(|event| event.code == code).count()
    }

    /// Counts error events with `code`.
    pub fn count_errors(&self, code: ResultCode) -> usize {
        self.errors.lock().iter().filter(|event| event.code == code).count()
    }

    /// Counts log messages containing `fragment`.
    pub fn count_logs(&self, fragment: &str) -> usize {
        self.logs
            .lock()
            .iter()
            .filter(|event| event.message.contains(fragment))
            .count()
    }

    /// Returns `true` if a log message contains `fragment`.
    pub fn has_log(&self, fragment: &str) -> bool {
        self.count_logs(fragment) > 0
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.data.lock().clear();
        self.errors.lock().clear();
        self.logs.lock().clear();
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("data", &self.data.lock().len())
            .field("errors", &self.error_codes())
            .field("logs", &self.log_messages())
            .finish()
    }
}

// =============================================================================
// Session Harness
// =============================================================================

/// A session, the mock server behind it and a recorder on its hub.
pub struct SessionHarness {
    /// Session under test.
    pub session: Session<MockProtocolClient>,

    /// Handle on the mock server shared with the session's client.
    pub server: MockProtocolClient,

    /// Recorder attached to the session's hub.
    pub events: EventRecorder,
}

impl SessionHarness {
    /// Creates a disconnected harness whose daemon never fires during a test.
    pub fn new() -> Self {
        Self::with_server(MockProtocolClient::new(), ConfigFixtures::quiet())
    }

    /// Creates a disconnected harness with `config`.
    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_server(MockProtocolClient::new(), config)
    }

    /// Creates a disconnected harness around a pre-configured mock.
    pub fn with_server(server: MockProtocolClient, config: SessionConfig) -> Self {
        let session = Session::new(server.clone(), config).expect("valid session config");
        let events = EventRecorder::attach(session.notifications());
        Self {
            session,
            server,
            events,
        }
    }

    /// Creates a harness already connected to [`MOCK_SERVER`].
    pub async fn connected() -> Self {
        let harness = Self::new();
        assert_eq!(harness.connect().await, ResultCode::Ok);
        harness
    }

    /// Connects to [`MOCK_SERVER`] on [`MOCK_HOST`].
    pub async fn connect(&self) -> ResultCode {
        self.session.connect(MOCK_SERVER, MOCK_HOST).await
    }

    /// Replaces the desired item set.
    pub async fn register(&self, items: Vec<DataItem>) {
        self.session.register_data_items(items).await;
    }

    /// Returns the desired entry named `name`.
    pub async fn item(&self, name: &str) -> Option<DataItem> {
        self.session
            .data_items()
            .await
            .into_iter()
            .find(|item| item.name == name)
    }

    /// Lets the session's event pump process queued server notifications.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

impl Default for SessionHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
