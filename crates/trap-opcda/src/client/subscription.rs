// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription groups and the reconciliation pass.
//!
//! The desired item set is partitioned by update rate; every distinct rate
//! maps to exactly one server-side group whose name is the textual rate.
//!
//! ```text
//! desired set                         server groups
//! ┌──────────────────────┐            ┌──────────────────────────┐
//! │ T1@1000  T2@1000     │ ────────▶  │ "1000"  [T1, T2]         │
//! │ T3@250               │ ────────▶  │ "250"   [T3]             │
//! └──────────────────────┘            └──────────────────────────┘
//! ```
//!
//! A pass is diff based: only missing members are added and only vanished
//! members are removed, so groups that already match the desired set are not
//! touched at all and keep delivering change notifications.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::session::SessionStats;
use super::transport::{DataChangeCallback, ItemResult, ProtocolClient};
use crate::error::{OpcDaError, OpcDaResult, OperationError};
use crate::notify::NotificationHub;
use crate::result::ResultCode;
use crate::types::{DataItem, GroupHandle, GroupState, ItemDescriptor, ItemHandle};

// =============================================================================
// SubscriptionGroup
// =============================================================================

/// A server-side group and its registered members.
#[derive(Debug, Clone)]
pub(crate) struct SubscriptionGroup {
    handle: GroupHandle,
    name: String,
    update_rate_ms: u32,
    members: Vec<(String, ItemHandle)>,
}

impl SubscriptionGroup {
    pub(crate) fn new(handle: GroupHandle, name: impl Into<String>, update_rate_ms: u32) -> Self {
        Self {
            handle,
            name: name.into(),
            update_rate_ms,
            members: Vec::new(),
        }
    }

    pub(crate) fn handle(&self) -> GroupHandle {
        self.handle
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn update_rate_ms(&self) -> u32 {
        self.update_rate_ms
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|(member, _)| member == name)
    }

    pub(crate) fn handle_of(&self, name: &str) -> Option<ItemHandle> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, handle)| *handle)
    }

    /// Records a member; an existing entry for the name is replaced.
    pub(crate) fn insert(&mut self, name: impl Into<String>, handle: ItemHandle) {
        let name = name.into();
        match self.members.iter_mut().find(|(member, _)| *member == name) {
            Some(entry) => entry.1 = handle,
            None => self.members.push((name, handle)),
        }
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<ItemHandle> {
        let index = self.members.iter().position(|(member, _)| member == name)?;
        Some(self.members.remove(index).1)
    }

    pub(crate) fn item_names(&self) -> Vec<String> {
        self.members.iter().map(|(name, _)| name.clone()).collect()
    }

    pub(crate) fn item_handles(&self) -> Vec<ItemHandle> {
        self.members.iter().map(|(_, handle)| *handle).collect()
    }

    pub(crate) fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            handle: self.handle,
            name: self.name.clone(),
            update_rate_ms: self.update_rate_ms,
            items: self.item_names(),
        }
    }
}

/// Read-only view of a subscription group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    /// Server-side handle.
    pub handle: GroupHandle,
    /// Group name (the textual rate).
    pub name: String,
    /// Update rate in milliseconds.
    pub update_rate_ms: u32,
    /// Member names in insertion order.
    pub items: Vec<String>,
}

impl fmt::Display for GroupSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): [{}]", self.name, self.handle, self.items.join(", "))
    }
}

// =============================================================================
// GroupTable
// =============================================================================

/// Groups in creation order.
#[derive(Debug, Default)]
pub(crate) struct GroupTable {
    groups: Vec<SubscriptionGroup>,
}

impl GroupTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn position(&self, update_rate_ms: u32) -> Option<usize> {
        self.groups
            .iter()
            .position(|group| group.update_rate_ms() == update_rate_ms)
    }

    pub(crate) fn push(&mut self, group: SubscriptionGroup) {
        self.groups.push(group);
    }

    /// Removes the group at `index`, shifting later groups down.
    pub(crate) fn take(&mut self, index: usize) -> SubscriptionGroup {
        self.groups.remove(index)
    }

    /// Puts a group back at `index`, preserving creation order.
    pub(crate) fn restore(&mut self, index: usize, group: SubscriptionGroup) {
        let index = index.min(self.groups.len());
        self.groups.insert(index, group);
    }

    /// Empties the table, newest group first.
    pub(crate) fn drain_reverse(&mut self) -> Vec<SubscriptionGroup> {
        let mut groups = std::mem::take(&mut self.groups);
        groups.reverse();
        groups
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }

    pub(crate) fn rates(&self) -> Vec<u32> {
        self.groups.iter().map(SubscriptionGroup::update_rate_ms).collect()
    }

    pub(crate) fn contains_handle(&self, handle: GroupHandle) -> bool {
        self.groups.iter().any(|group| group.handle() == handle)
    }

    /// Finds the group and member handle registered for an item.
    pub(crate) fn resolve(&self, name: &str, update_rate_ms: u32) -> Option<(GroupHandle, ItemHandle)> {
        let index = self.position(update_rate_ms)?;
        let group = &self.groups[index];
        group.handle_of(name).map(|item| (group.handle(), item))
    }

    pub(crate) fn snapshots(&self) -> Vec<GroupSnapshot> {
        self.groups.iter().map(SubscriptionGroup::snapshot).collect()
    }
}

// =============================================================================
// Diff helpers
// =============================================================================

/// Partitions the desired set by update rate, ascending.
pub(crate) fn partition_by_rate(items: &[DataItem]) -> BTreeMap<u32, Vec<String>> {
    let mut partitions: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for item in items {
        partitions
            .entry(item.update_rate_ms)
            .or_default()
            .push(item.name.clone());
    }
    partitions
}

/// Membership changes needed to make a group match its partition.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct GroupDiff {
    pub(crate) to_add: Vec<String>,
    pub(crate) to_remove: Vec<String>,
}

impl GroupDiff {
    pub(crate) fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub(crate) fn diff_group(group: &SubscriptionGroup, desired: &[String]) -> GroupDiff {
    let wanted: BTreeSet<&str> = desired.iter().map(String::as_str).collect();

    let to_add = desired
        .iter()
        .filter(|name| !group.contains(name))
        .cloned()
        .collect();
    let to_remove = group
        .item_names()
        .into_iter()
        .filter(|name| !wanted.contains(name.as_str()))
        .collect();

    GroupDiff { to_add, to_remove }
}

// =============================================================================
// Reconciler
// =============================================================================

/// One reconciliation pass over the session state.
///
/// Every failure that leaves the link up is reported as an error event and
/// the pass moves on. An `Err` return always means the link is gone; the
/// caller then runs the disconnect bookkeeping.
pub(crate) struct Reconciler<'a, C: ProtocolClient> {
    client: &'a mut C,
    groups: &'a mut GroupTable,
    desired: &'a mut [DataItem],
    hub: &'a NotificationHub,
    stats: &'a SessionStats,
    deadband: f32,
    on_data_change: DataChangeCallback,
}

impl<'a, C: ProtocolClient> Reconciler<'a, C> {
    pub(crate) fn new(
        client: &'a mut C,
        groups: &'a mut GroupTable,
        desired: &'a mut [DataItem],
        hub: &'a NotificationHub,
        stats: &'a SessionStats,
        deadband: f32,
        on_data_change: DataChangeCallback,
    ) -> Self {
        Self {
            client,
            groups,
            desired,
            hub,
            stats,
            deadband,
            on_data_change,
        }
    }

    pub(crate) async fn run(mut self) -> OpcDaResult<()> {
        if self.desired.is_empty() {
            return self.cancel_all().await;
        }

        let partitions = partition_by_rate(&*self.desired);
        for (rate, names) in &partitions {
            self.ensure_link()?;
            match self.groups.position(*rate) {
                Some(index) => self.update_group(index, names).await?,
                None => self.create_group(*rate, names).await?,
            }
        }

        let vacated: Vec<u32> = self
            .groups
            .rates()
            .into_iter()
            .filter(|rate| !partitions.contains_key(rate))
            .collect();
        for rate in vacated {
            self.ensure_link()?;
            if let Some(index) = self.groups.position(rate) {
                self.retire_group(index).await?;
            }
        }

        Ok(())
    }

    async fn cancel_all(&mut self) -> OpcDaResult<()> {
        if self.groups.is_empty() {
            debug!("No subscription groups to cancel");
            return Ok(());
        }

        for group in self.groups.drain_reverse() {
            self.release_group(group).await?;
        }
        self.hub.emit_log("All subscriptions canceled");
        Ok(())
    }

    async fn create_group(&mut self, rate: u32, names: &[String]) -> OpcDaResult<()> {
        let state = GroupState::for_rate(rate, self.deadband);
        let created = self.client.create_group(&state).await;
        let Some(handle) = self.absorb(created, || {
            format!("Failed to create subscription group {}", state.name)
        })?
        else {
            return Ok(());
        };

        self.stats.record_group_created();
        info!(group = %state.name, handle = %handle, rate_ms = rate, items = names.len(), "Subscription group created");

        let mut group = SubscriptionGroup::new(handle, state.name, rate);
        let descriptors: Vec<ItemDescriptor> = names
            .iter()
            .map(|name| ItemDescriptor::new(name.as_str()))
            .collect();
        let added = self.client.add_items(handle, &descriptors).await;
        self.client
            .set_data_callback(handle, Some(Arc::clone(&self.on_data_change)));

        let group_name = group.name().to_string();
        if let Some(results) = self.absorb(added, || {
            format!("Failed to add items to subscription group {group_name}")
        })? {
            self.apply_add_results(&mut group, results);
        }

        if group.is_empty() {
            self.release_group(group).await?;
            self.hub
                .emit_log(format!("Subscription group {group_name} removed"));
        } else {
            self.groups.push(group);
        }
        Ok(())
    }

    async fn update_group(&mut self, index: usize, names: &[String]) -> OpcDaResult<()> {
        let mut group = self.groups.take(index);
        let diff = diff_group(&group, names);
        if diff.is_empty() {
            self.groups.restore(index, group);
            return Ok(());
        }

        debug!(
            group = %group.name(),
            add = diff.to_add.len(),
            remove = diff.to_remove.len(),
            "Updating subscription group"
        );

        if !diff.to_add.is_empty() {
            let descriptors: Vec<ItemDescriptor> = diff
                .to_add
                .iter()
                .map(|name| ItemDescriptor::new(name.as_str()))
                .collect();
            let added = self.client.add_items(group.handle(), &descriptors).await;
            let group_name = group.name().to_string();
            if let Some(results) = self.absorb(added, || {
                format!("Failed to add items to subscription group {group_name}")
            })? {
                self.apply_add_results(&mut group, results);
            }
            self.ensure_link()?;
        }

        if !diff.to_remove.is_empty() {
            self.remove_members(&mut group, &diff.to_remove).await?;
        }

        if group.is_empty() {
            let group_name = group.name().to_string();
            self.release_group(group).await?;
            self.hub
                .emit_log(format!("Subscription group {group_name} removed"));
        } else {
            self.groups.restore(index, group);
        }
        Ok(())
    }

    /// Empties and cancels a group whose rate left the desired set.
    async fn retire_group(&mut self, index: usize) -> OpcDaResult<()> {
        let mut group = self.groups.take(index);
        let names = group.item_names();
        self.remove_members(&mut group, &names).await?;

        let group_name = group.name().to_string();
        self.release_group(group).await?;
        self.hub
            .emit_log(format!("Subscription group {group_name} removed"));
        Ok(())
    }

    fn apply_add_results(&mut self, group: &mut SubscriptionGroup, results: Vec<ItemResult>) {
        for result in results {
            match result.server_handle.filter(|_| result.is_success()) {
                Some(handle) => {
                    group.insert(result.item_name.as_str(), handle);
                    self.stats.record_items_added(1);
                    debug!(group = %group.name(), item = %result.item_name, handle = %handle, "Data item registered");

                    let registered = self
                        .desired
                        .iter_mut()
                        .find(|item| item.name == result.item_name)
                        .map(|item| {
                            item.quality = ResultCode::Ok;
                            item.clone()
                        });
                    if let Some(item) = registered {
                        self.hub.emit_data_changed(ResultCode::ItemRegistered, item);
                    }
                }
                None => {
                    let code = match result.code() {
                        ResultCode::Ok => ResultCode::GenericFailure,
                        code => code,
                    };
                    if let Some(item) = self
                        .desired
                        .iter_mut()
                        .find(|item| item.name == result.item_name)
                    {
                        item.quality = code;
                    }
                    self.report(
                        code,
                        format!("Failed to register data item '{}': {code}", result.item_name),
                        Some(OperationError::item_rejected(&result.item_name, result.result_id).into()),
                    );
                }
            }
        }
    }

    async fn remove_members(&mut self, group: &mut SubscriptionGroup, names: &[String]) -> OpcDaResult<()> {
        let handles: Vec<ItemHandle> = names.iter().filter_map(|name| group.handle_of(name)).collect();
        if handles.is_empty() {
            return Ok(());
        }

        let removed = self.client.remove_items(group.handle(), &handles).await;
        let group_name = group.name().to_string();
        let Some(results) = self.absorb(removed, || {
            format!("Failed to remove items from subscription group {group_name}")
        })?
        else {
            return Ok(());
        };

        for result in results {
            if result.is_success() {
                group.remove(&result.item_name);
                self.stats.record_items_removed(1);
                self.hub.emit_data_changed(
                    ResultCode::ItemUnregistered,
                    DataItem::unregistered(result.item_name.as_str(), group.update_rate_ms()),
                );
            } else {
                self.report(
                    ResultCode::GenericFailure,
                    format!(
                        "Failed to unregister data item '{}': {}",
                        result.item_name,
                        result.code()
                    ),
                    Some(OperationError::item_rejected(&result.item_name, result.result_id).into()),
                );
            }
        }
        Ok(())
    }

    /// Unhooks, empties and cancels a group that is no longer in the table.
    async fn release_group(&mut self, group: SubscriptionGroup) -> OpcDaResult<()> {
        self.client.set_data_callback(group.handle(), None);

        let handles = group.item_handles();
        if !handles.is_empty() {
            let removed = self.client.remove_items(group.handle(), &handles).await;
            if self
                .absorb(removed, || {
                    format!("Failed to remove items from subscription group {}", group.name())
                })?
                .is_some()
            {
                self.stats.record_items_removed(handles.len() as u64);
            }
        }

        let canceled = self.client.cancel_group(group.handle()).await;
        if self
            .absorb(canceled, || {
                format!("Failed to cancel subscription group {}", group.name())
            })?
            .is_some()
        {
            self.stats.record_group_canceled();
        }

        debug!(group = %group.name(), handle = %group.handle(), "Subscription group released");
        Ok(())
    }

    fn ensure_link(&self) -> OpcDaResult<()> {
        if self.client.is_connected() {
            Ok(())
        } else {
            Err(OpcDaError::connection_lost("transport reports the server link is down"))
        }
    }

    /// Passes connection-class failures up; reports every other failure.
    fn absorb<T>(
        &self,
        result: OpcDaResult<T>,
        message: impl FnOnce() -> String,
    ) -> OpcDaResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_connection_loss() => Err(error),
            Err(error) => {
                self.report(error.result_code(), message(), Some(error));
                Ok(None)
            }
        }
    }

    fn report(&self, code: ResultCode, message: String, source: Option<OpcDaError>) {
        self.stats.record_error();
        self.hub.emit_error(code, message, source.map(Arc::new));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with(names: &[&str]) -> SubscriptionGroup {
        let mut group = SubscriptionGroup::new(GroupHandle::new(1), "1000", 1000);
        for (index, name) in names.iter().enumerate() {
            group.insert(*name, ItemHandle::new(index as u32 + 1));
        }
        group
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_partition_by_rate_is_ascending() {
        let items = vec![
            DataItem::new("A", 1000),
            DataItem::new("B", 250),
            DataItem::new("C", 1000),
        ];
        let partitions = partition_by_rate(&items);

        assert_eq!(partitions.keys().copied().collect::<Vec<_>>(), vec![250, 1000]);
        assert_eq!(partitions[&1000], names(&["A", "C"]));
        assert_eq!(partitions[&250], names(&["B"]));
    }

    #[test]
    fn test_diff_group() {
        let group = group_with(&["A", "B", "C"]);
        let diff = diff_group(&group, &names(&["B", "C", "D"]));

        assert_eq!(diff.to_add, names(&["D"]));
        assert_eq!(diff.to_remove, names(&["A"]));
    }

    #[test]
    fn test_diff_group_matching_set_is_empty() {
        let group = group_with(&["A", "B"]);
        assert!(diff_group(&group, &names(&["B", "A"])).is_empty());
    }

    #[test]
    fn test_group_membership() {
        let mut group = group_with(&["A", "B"]);
        assert_eq!(group.len(), 2);
        assert_eq!(group.handle_of("B"), Some(ItemHandle::new(2)));

        group.insert("B", ItemHandle::new(7));
        assert_eq!(group.len(), 2);
        assert_eq!(group.handle_of("B"), Some(ItemHandle::new(7)));

        assert_eq!(group.remove("A"), Some(ItemHandle::new(1)));
        assert_eq!(group.remove("A"), None);
        assert_eq!(group.item_names(), names(&["B"]));
    }

    #[test]
    fn test_group_table() {
        let mut table = GroupTable::new();
        table.push(group_with(&["A"]));
        let mut fast = SubscriptionGroup::new(GroupHandle::new(2), "250", 250);
        fast.insert("F", ItemHandle::new(10));
        table.push(fast);

        assert_eq!(table.rates(), vec![1000, 250]);
        assert_eq!(table.position(250), Some(1));
        assert_eq!(
            table.resolve("F", 250),
            Some((GroupHandle::new(2), ItemHandle::new(10)))
        );
        assert_eq!(table.resolve("F", 1000), None);
        assert!(table.contains_handle(GroupHandle::new(1)));

        let taken = table.take(0);
        assert_eq!(table.rates(), vec![250]);
        table.restore(0, taken);
        assert_eq!(table.rates(), vec![1000, 250]);

        let drained = table.drain_reverse();
        assert_eq!(
            drained.iter().map(|g| g.update_rate_ms()).collect::<Vec<_>>(),
            vec![250, 1000]
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = group_with(&["A", "B"]).snapshot();
        assert_eq!(snapshot.items, names(&["A", "B"]));
        assert_eq!(snapshot.to_string(), "1000 (grp-1): [A, B]");
    }
}
