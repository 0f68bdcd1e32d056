// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request logging must never carry OAuth codes or state.

use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;

mod common;
use common::{location, TestApp};

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[tokio::test]
async fn test_callback_code_and_state_stay_out_of_logs() {
    let captured = Captured::default();
    let writer = captured.clone();
    // Same JSON layout as the server's subscriber
    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(move || writer.clone()),
    );
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::spawn().await;
    app.mock_google_login("alice@x.com", "g-access", "g-refresh").await;
    let state = app.state_param(false);

    let response = app
        .get(
            &format!("/auth/google/callback?code=SUPERSECRETCODE123&state={}", state),
            None,
        )
        .await;
    assert_eq!(location(&response), "http://localhost:3000/dashboard");

    let logs = captured.text();
    assert!(logs.contains("Login complete"), "expected request logs, got: {logs}");
    assert!(logs.contains("/auth/google/callback"));
    assert!(!logs.contains("SUPERSECRETCODE123"));
    assert!(!logs.contains(&state));
    assert!(!logs.contains("g-access"));
    assert!(!logs.contains("g-refresh"));
}
