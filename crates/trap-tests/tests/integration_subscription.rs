// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Subscription Integration Tests
//!
//! - Rate partitioning
//! - Diff-based reconciliation
//! - Per-item failure reporting
//! - Desired set normalization
//!
//! ## Test Categories
//!
//! - `test_register_*`: Registration tests
//! - `test_reconcile_*`: Reconciliation behavior tests
//! - `test_items_*`: Item validation tests

use trap_opcda::result::hresult;
use trap_opcda::{DataItem, ResultCode, SessionState};

use trap_tests::prelude::*;

// =============================================================================
// Registration Tests
// =============================================================================

#[tokio::test]
async fn test_register_single_item() {
    init_test_logging();
    let harness = SessionHarness::connected().await;

    harness.register(vec![DataItem::new("T1", 1000)]).await;

    assert_eq!(harness.events.data_codes_for("T1"), vec![ResultCode::ItemRegistered]);
    assert_eq!(harness.session.group_count().await, 1);
    harness.item("T1").await.unwrap().assert_good_quality();
    assert_no_errors(&harness.events);

    let groups = harness.server.groups();
    let group = groups.values().next().unwrap();
    assert_eq!(group.name, "1000");
    assert_eq!(group.update_rate_ms, 1000);
    assert!(harness.server.has_callback(1000));
}

#[tokio::test]
async fn test_register_empty_set_cancels_all_groups() {
    let harness = SessionHarness::connected().await;
    harness.register(vec![DataItem::new("T1", 1000)]).await;

    harness.register(Vec::new()).await;

    assert_eq!(harness.session.group_count().await, 0);
    assert_eq!(harness.server.group_count(), 0);
    assert_log_contains(&harness.events, "All subscriptions canceled");
    assert!(harness.session.data_items().await.is_empty());
}

#[tokio::test]
async fn test_register_one_group_per_rate() {
    let harness = SessionHarness::connected().await;

    harness.register(ItemFixtures::mixed_rates()).await;

    assert_groups(
        &harness.session,
        &[
            (250, &["Plant.Conveyor.Count"]),
            (1000, &["Plant.Boiler.Temperature", "Plant.Boiler.Pressure"]),
            (5000, &["Plant.Valve.Setpoint"]),
        ],
    )
    .await;
    assert_eq!(harness.server.group_count(), 3);
    assert_eq!(harness.server.get_create_group_count(), 3);
    assert_all_quality(&harness.session, ResultCode::Ok).await;
    assert_eq!(harness.events.count_data(ResultCode::ItemRegistered), 4);
}

#[tokio::test]
async fn test_register_while_disconnected() {
    let harness = SessionHarness::new();

    harness.register(vec![ItemFixtures::temperature()]).await;

    assert_single_error(&harness.events, ResultCode::ServerNotConnected);
    assert_eq!(harness.server.get_create_group_count(), 0);
    assert_eq!(harness.session.data_items().await.len(), 1);
    harness
        .item("Plant.Boiler.Temperature")
        .await
        .unwrap()
        .assert_quality(ResultCode::Unknown);
}

// =============================================================================
// Reconciliation Tests
// =============================================================================

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let harness = SessionHarness::connected().await;
    harness.register(ItemFixtures::mixed_rates()).await;
    harness.server.reset_counters();
    harness.events.clear();

    harness.register(ItemFixtures::mixed_rates()).await;

    assert_eq!(harness.server.get_create_group_count(), 0);
    assert_eq!(harness.server.get_add_items_count(), 0);
    assert_eq!(harness.server.get_remove_items_count(), 0);
    assert_eq!(harness.server.get_cancel_group_count(), 0);
    assert!(harness.events.data_events().is_empty());
    assert_no_errors(&harness.events);
}

#[tokio::test]
async fn test_reconcile_diff_adds_and_removes_only_changes() {
    let harness = SessionHarness::connected().await;
    harness
        .register(ItemFixtures::named(&["A", "B", "C"], 1000))
        .await;
    harness.server.reset_counters();
    harness.events.clear();

    harness
        .register(ItemFixtures::named(&["B", "C", "D"], 1000))
        .await;

    assert_eq!(harness.server.get_add_items_count(), 1);
    assert_eq!(harness.server.get_remove_items_count(), 1);
    assert_eq!(harness.server.get_create_group_count(), 0);
    assert_eq!(harness.events.data_codes_for("D"), vec![ResultCode::ItemRegistered]);
    assert_eq!(harness.events.data_codes_for("A"), vec![ResultCode::ItemUnregistered]);
    assert!(harness.events.data_codes_for("B").is_empty());
    assert!(harness.events.data_codes_for("C").is_empty());

    assert_groups(&harness.session, &[(1000, &["B", "C", "D"])]).await;
    assert_eq!(
        harness.server.group_items(1000).unwrap(),
        vec!["B".to_string(), "C".to_string(), "D".to_string()]
    );
}

#[tokio::test]
async fn test_reconcile_moves_item_to_new_rate() {
    let harness = SessionHarness::connected().await;
    harness
        .register(vec![DataItem::new("T1", 1000), DataItem::new("T2", 1000)])
        .await;
    harness.events.clear();

    harness
        .register(vec![DataItem::new("T1", 250), DataItem::new("T2", 1000)])
        .await;

    assert_groups(&harness.session, &[(1000, &["T2"]), (250, &["T1"])]).await;
    assert_eq!(
        harness.events.data_codes_for("T1"),
        vec![ResultCode::ItemRegistered, ResultCode::ItemUnregistered]
    );

    let moved = harness.item("T1").await.unwrap();
    assert_eq!(moved.update_rate_ms, 250);
    moved.assert_good_quality();
}

#[tokio::test]
async fn test_reconcile_retires_vacated_rate() {
    let harness = SessionHarness::connected().await;
    harness
        .register(vec![DataItem::new("T1", 1000), DataItem::new("T2", 250)])
        .await;
    assert_eq!(harness.session.group_rates().await, vec![250, 1000]);

    harness.register(vec![DataItem::new("T1", 1000)]).await;

    assert_eq!(harness.session.group_rates().await, vec![1000]);
    assert_eq!(harness.server.group_count(), 1);
    assert_eq!(
        harness.events.data_codes_for("T2"),
        vec![ResultCode::ItemRegistered, ResultCode::ItemUnregistered]
    );
    assert_log_contains(&harness.events, "Subscription group 250 removed");
}

#[tokio::test]
async fn test_reconcile_removing_last_member_drops_group() {
    let harness = SessionHarness::connected().await;
    harness
        .register(vec![DataItem::new("T1", 1000), DataItem::new("T2", 1000)])
        .await;

    harness.register(vec![DataItem::new("T3", 250)]).await;

    assert_groups(&harness.session, &[(250, &["T3"])]).await;
    assert_eq!(harness.server.group_count(), 1);
    assert_eq!(harness.events.count_data(ResultCode::ItemUnregistered), 2);
}

#[tokio::test]
async fn test_reconcile_rejected_item_does_not_abort_batch() {
    let server = MockServerBuilder::new()
        .reject("Plant.Unknown.Tag", hresult::OPC_E_UNKNOWNITEMID)
        .build();
    let harness = SessionHarness::with_server(server, ConfigFixtures::quiet());
    assert_eq!(harness.connect().await, ResultCode::Ok);

    harness
        .register(vec![
            ItemFixtures::temperature(),
            DataItem::new("Plant.Unknown.Tag", 1000),
            ItemFixtures::pressure(),
        ])
        .await;

    assert_single_error(&harness.events, ResultCode::UnknownItemName);
    harness
        .item("Plant.Unknown.Tag")
        .await
        .unwrap()
        .assert_quality(ResultCode::UnknownItemName);
    harness
        .item("Plant.Boiler.Temperature")
        .await
        .unwrap()
        .assert_good_quality();
    assert_groups(
        &harness.session,
        &[(1000, &["Plant.Boiler.Temperature", "Plant.Boiler.Pressure"])],
    )
    .await;
}

#[tokio::test]
async fn test_reconcile_removal_failure_keeps_member() {
    let harness = SessionHarness::connected().await;
    harness
        .register(ItemFixtures::named(&["A", "B"], 1000))
        .await;
    harness.server.fail_remove("A", hresult::E_FAIL);
    harness.events.clear();

    harness.register(ItemFixtures::named(&["C"], 1000)).await;

    assert_single_error(&harness.events, ResultCode::GenericFailure);
    assert!(harness.events.error_events()[0].message.contains("'A'"));
    assert_eq!(
        harness.events.data_codes_for("B"),
        vec![ResultCode::ItemUnregistered]
    );
    assert!(harness.events.data_codes_for("A").is_empty());
    assert_eq!(
        harness.events.data_codes_for("C"),
        vec![ResultCode::ItemRegistered]
    );

    assert_groups(&harness.session, &[(1000, &["A", "C"])]).await;
    assert_eq!(
        harness.server.group_items(1000),
        Some(vec!["A".to_string(), "C".to_string()])
    );
    assert_eq!(harness.session.stats().items_removed(), 1);
}

#[tokio::test]
async fn test_reconcile_fully_rejected_group_is_released() {
    let server = MockServerBuilder::new()
        .reject("Plant.Unknown.Tag", hresult::OPC_E_BADRIGHTS)
        .build();
    let harness = SessionHarness::with_server(server, ConfigFixtures::quiet());
    assert_eq!(harness.connect().await, ResultCode::Ok);

    harness
        .register(vec![DataItem::new("Plant.Unknown.Tag", 1000)])
        .await;

    assert_eq!(harness.session.group_count().await, 0);
    assert_eq!(harness.server.group_count(), 0);
    assert_single_error(&harness.events, ResultCode::BadRights);
    assert_log_contains(&harness.events, "Subscription group 1000 removed");
}

#[tokio::test]
async fn test_reconcile_group_creation_failure() {
    let harness = SessionHarness::connected().await;
    harness.server.fail_create_group(true);

    harness.register(vec![ItemFixtures::temperature()]).await;

    assert_eq!(harness.session.group_count().await, 0);
    assert_eq!(harness.session.state().await, SessionState::Connected);
    assert_single_error(&harness.events, ResultCode::GenericFailure);
    harness
        .item("Plant.Boiler.Temperature")
        .await
        .unwrap()
        .assert_quality(ResultCode::Unknown);
}

#[tokio::test]
async fn test_reconcile_link_drop_aborts_pass() {
    let harness = SessionHarness::connected().await;
    harness.server.drop_on_add_call(2);

    harness.register(ItemFixtures::mixed_rates()).await;

    assert_eq!(harness.server.get_create_group_count(), 2);
    assert_eq!(harness.session.state().await, SessionState::Disconnected);
    assert_eq!(harness.session.group_count().await, 0);
    assert_all_quality(&harness.session, ResultCode::ServerNotConnected).await;
    assert_log_contains(&harness.events, "OPC server disconnected");
    assert_no_errors(&harness.events);
}

#[tokio::test]
async fn test_reconcile_stats() {
    let harness = SessionHarness::connected().await;
    harness
        .register(ItemFixtures::named(&["A", "B", "C"], 1000))
        .await;
    harness
        .register(ItemFixtures::named(&["B", "C", "D"], 1000))
        .await;

    let stats = harness.session.stats();
    assert_eq!(stats.reconciliations(), 2);
    assert_eq!(stats.groups_created(), 1);
    assert_eq!(stats.items_added(), 4);
    assert_eq!(stats.items_removed(), 1);
}

// =============================================================================
// Item Validation Tests
// =============================================================================

#[tokio::test]
async fn test_items_duplicate_and_invalid_rejected() {
    let harness = SessionHarness::connected().await;

    harness
        .register(vec![
            DataItem::new("T1", 1000),
            DataItem::new("T1", 250),
            DataItem::new("  ", 1000),
            DataItem::new("T2", 0),
        ])
        .await;

    assert_eq!(harness.events.count_errors(ResultCode::DuplicateName), 1);
    assert_eq!(harness.events.count_errors(ResultCode::InvalidArgument), 2);

    let items = harness.session.data_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "T1");
    assert_eq!(items[0].update_rate_ms, 1000);
    assert_groups(&harness.session, &[(1000, &["T1"])]).await;
}

#[tokio::test]
async fn test_items_keep_state_across_registrations() {
    let harness = SessionHarness::connected().await;
    harness.server.set_value("T1", 12i32);
    harness.register(vec![DataItem::new("T1", 1000)]).await;
    harness.session.read(&DataItem::new("T1", 1000)).await.unwrap();

    harness
        .register(vec![DataItem::new("T1", 1000), DataItem::new("T2", 1000)])
        .await;

    let kept = harness.item("T1").await.unwrap();
    kept.assert_good_quality();
    kept.assert_value(&12i32.into());
}

#[tokio::test]
async fn test_items_group_snapshot() {
    let harness = SessionHarness::connected().await;
    harness
        .register(vec![DataItem::new("T1", 1000), DataItem::new("T2", 1000)])
        .await;

    let groups = harness.session.groups().await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "1000");
    assert_eq!(groups[0].items, vec!["T1".to_string(), "T2".to_string()]);
    assert_eq!(Some(groups[0].handle), harness.server.group_handle(1000));
}
