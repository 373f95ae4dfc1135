// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Connection Integration Tests
//!
//! - Discovery and connect validation
//! - Target switching
//! - Disconnect and session shutdown
//!
//! ## Test Categories
//!
//! - `test_connect_*`: Connect tests
//! - `test_disconnect_*`: Disconnect tests
//! - `test_discovery_*`: Server listing tests
//! - `test_session_*`: Session lifecycle tests

use std::time::Duration;

use trap_opcda::result::hresult;
use trap_opcda::{ResultCode, Session, SessionConfig, SessionState};

use trap_tests::prelude::*;

// =============================================================================
// Connect Tests
// =============================================================================

#[tokio::test]
async fn test_connect_success() {
    init_test_logging();
    let harness = SessionHarness::new();

    assert_eq!(harness.connect().await, ResultCode::Ok);
    assert_eq!(harness.session.state().await, SessionState::Connected);
    assert!(harness.session.daemon().is_enabled());
    assert_eq!(harness.server.get_discover_count(), 1);
    assert_eq!(harness.server.get_connect_count(), 1);
    assert_eq!(harness.session.stats().connects(), 1);
    assert_log_contains(&harness.events, "Connected to OPC server");
    assert_no_errors(&harness.events);

    let target = harness.session.target().await.unwrap();
    assert_eq!(target.server_name, MOCK_SERVER);
    assert_eq!(target.host, MOCK_HOST);
}

#[tokio::test]
async fn test_connect_same_target_is_noop() {
    let harness = SessionHarness::connected().await;

    assert_eq!(harness.connect().await, ResultCode::Ok);
    assert_eq!(harness.server.get_connect_count(), 1);
    assert_log_contains(&harness.events, "Already connected");
}

#[tokio::test]
async fn test_connect_blank_arguments() {
    let harness = SessionHarness::new();

    assert_eq!(
        harness.session.connect("", MOCK_HOST).await,
        ResultCode::GenericFailure
    );
    assert_eq!(
        harness.session.connect(MOCK_SERVER, "   ").await,
        ResultCode::GenericFailure
    );

    assert_eq!(harness.server.get_discover_count(), 0);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert!(harness.session.target().await.is_none());
    assert!(!harness.session.daemon().is_enabled());
}

#[tokio::test]
async fn test_connect_unknown_server() {
    let harness = SessionHarness::new();

    let code = harness.session.connect("Vendor.Missing.1", MOCK_HOST).await;

    assert_eq!(code, ResultCode::GenericFailure);
    assert_eq!(harness.server.get_connect_count(), 0);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_single_error(&harness.events, ResultCode::GenericFailure);
    assert_eq!(harness.session.stats().connect_failures(), 1);

    let event = &harness.events.error_events()[0];
    let source = event.source.as_ref().unwrap();
    assert!(source.to_string().contains("Vendor.Missing.1"));
}

#[tokio::test]
async fn test_connect_refused_arms_daemon() {
    let server = MockServerBuilder::new().refuse_connections().build();
    let harness = SessionHarness::with_server(server, ConfigFixtures::quiet());

    assert_eq!(harness.connect().await, ResultCode::GenericFailure);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_single_error(&harness.events, ResultCode::GenericFailure);
    assert!(harness.session.daemon().is_enabled());
    assert!(harness.session.target().await.is_some());
}

#[tokio::test]
async fn test_connect_switches_target() {
    let server = MockServerBuilder::new()
        .servers(&["Vendor.Primary.1", "Vendor.Backup.1"])
        .build();
    let harness = SessionHarness::with_server(server, ConfigFixtures::quiet());

    assert_eq!(
        harness.session.connect("Vendor.Primary.1", MOCK_HOST).await,
        ResultCode::Ok
    );
    harness.register(vec![ItemFixtures::temperature()]).await;
    assert_eq!(harness.session.group_count().await, 1);

    assert_eq!(
        harness.session.connect("Vendor.Backup.1", MOCK_HOST).await,
        ResultCode::Ok
    );

    assert_eq!(harness.server.get_cancel_group_count(), 1);
    assert_eq!(harness.server.get_disconnect_count(), 1);
    assert_eq!(harness.session.group_count().await, 0);
    assert_eq!(
        harness.session.target().await.unwrap().server_name,
        "Vendor.Backup.1"
    );
    assert_all_quality(&harness.session, ResultCode::ServerNotConnected).await;
    assert_log_contains(&harness.events, "Connected to OPC server Vendor.Backup.1");
}

// =============================================================================
// Disconnect Tests
// =============================================================================

#[tokio::test]
async fn test_disconnect_never_connected() {
    let harness = SessionHarness::new();

    assert_eq!(
        harness.session.disconnect().await,
        ResultCode::ServerNotConnected
    );
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_eq!(harness.server.get_disconnect_count(), 0);
    assert_log_contains(&harness.events, "already disconnected");
    assert_no_errors(&harness.events);
}

#[tokio::test]
async fn test_disconnect_tears_down_all_groups() {
    let harness = SessionHarness::connected().await;
    harness.register(ItemFixtures::mixed_rates()).await;
    assert_eq!(harness.server.group_count(), 3);

    assert_eq!(harness.session.disconnect().await, ResultCode::Ok);

    assert_eq!(harness.server.group_count(), 0);
    assert_eq!(harness.server.get_cancel_group_count(), 3);
    assert_eq!(harness.server.get_disconnect_count(), 1);
    assert_eq!(harness.session.group_count().await, 0);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert!(!harness.session.daemon().is_enabled());
    assert_all_quality(&harness.session, ResultCode::ServerNotConnected).await;
    assert_log_contains(&harness.events, "Disconnected from OPC server");
    assert_no_errors(&harness.events);
}

#[tokio::test]
async fn test_disconnect_reports_removal_failure() {
    let harness = SessionHarness::connected().await;
    harness
        .register(vec![ItemFixtures::temperature(), ItemFixtures::pressure()])
        .await;
    harness
        .server
        .fail_remove("Plant.Boiler.Pressure", hresult::E_FAIL);

    assert_eq!(
        harness.session.disconnect().await,
        ResultCode::GenericFailure
    );

    assert_single_error(&harness.events, ResultCode::GenericFailure);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_eq!(harness.server.get_disconnect_count(), 1);
}

#[tokio::test]
async fn test_disconnect_after_link_drop() {
    let harness = SessionHarness::connected().await;
    harness.register(vec![ItemFixtures::temperature()]).await;
    harness.server.drop_connection();

    assert_eq!(harness.session.disconnect().await, ResultCode::Ok);

    assert_eq!(harness.server.get_cancel_group_count(), 0);
    assert_eq!(harness.server.get_disconnect_count(), 1);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_eq!(harness.session.group_count().await, 0);
}

#[tokio::test]
async fn test_disconnect_twice() {
    let harness = SessionHarness::connected().await;

    assert_eq!(harness.session.disconnect().await, ResultCode::Ok);
    assert_eq!(
        harness.session.disconnect().await,
        ResultCode::ServerNotConnected
    );
    assert_eq!(harness.server.get_disconnect_count(), 1);
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[tokio::test]
async fn test_discovery_lists_servers() {
    let server = MockServerBuilder::new()
        .servers(&["Vendor.A.1", "Vendor.B.1"])
        .build();
    let harness = SessionHarness::with_server(server, ConfigFixtures::quiet());

    let servers = harness.session.available_servers(Some("10.0.0.5")).await;
    assert_eq!(servers, vec!["Vendor.A.1".to_string(), "Vendor.B.1".to_string()]);

    let servers = harness.session.available_servers(None).await;
    assert_eq!(servers.len(), 2);
    assert_no_errors(&harness.events);
}

#[tokio::test]
async fn test_discovery_failure_reports_error() {
    let server = MockServerBuilder::new().fail_discovery().build();
    let harness = SessionHarness::with_server(server, ConfigFixtures::quiet());

    assert!(harness.session.available_servers(None).await.is_empty());
    assert_single_error(&harness.events, ResultCode::GenericFailure);
}

// =============================================================================
// Session Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_session_rejects_invalid_config() {
    let config = SessionConfig {
        health_interval: Duration::ZERO,
        ..SessionConfig::default()
    };

    assert!(Session::new(MockProtocolClient::new(), config).is_err());
}

#[tokio::test]
async fn test_session_shutdown_releases_everything() {
    let harness = SessionHarness::connected().await;
    harness.register(vec![ItemFixtures::temperature()]).await;

    harness.session.shutdown().await;

    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_eq!(harness.server.group_count(), 0);
    assert_eq!(harness.session.notifications().observer_count(), 0);
    assert!(!harness.session.daemon().is_running());
}
