//! In-memory notification store.
//!
//! Single writer for the notification collection and its derived aggregates.
//! Every mutation path goes through the merge rules here: insert dedups by
//! id, the read flag only ever moves unread -> read, and deletion is
//! terminal. This is what makes arbitrary interleavings of HTTP completions,
//! push events, and user intents safe without any per-record locking.

use std::collections::{HashMap, HashSet};

use tokio::sync::watch;
use tracing::{debug, warn};

use super::models::{Notification, NotificationStats, NotificationType};

pub struct NotificationStore {
    /// Loaded records, newest first.
    records: Vec<Notification>,
    /// Ids deleted locally or by push event; events for these are ignored.
    tombstones: HashSet<String>,
    /// Running unread counter, adjusted by one per qualifying transition.
    unread: usize,
    /// Running per-type counters; never decremented below zero.
    by_type: HashMap<NotificationType, usize>,
    /// Bumped on every effective mutation so consumers can re-render.
    version_tx: watch::Sender<u64>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            records: Vec::new(),
            tombstones: HashSet::new(),
            unread: 0,
            by_type: HashMap::new(),
            version_tx,
        }
    }

    /// Subscribe to the store version signal.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    fn bump(&self) {
        self.version_tx.send_modify(|v| *v += 1);
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|n| n.id == id)
    }

    /// Install a fetched snapshot, replacing the loaded collection.
    ///
    /// Tombstones for ids present in the snapshot are cleared: a fresh server
    /// snapshot is authoritative, so an id it contains exists again.
    pub fn replace_all(&mut self, items: Vec<Notification>) {
        self.tombstones
            .retain(|id| !items.iter().any(|n| &n.id == id));
        self.records = items;
        let stats = self.recompute_stats();
        self.unread = stats.unread;
        self.by_type = stats.by_type;
        self.bump();
    }

    /// Merge-by-identifier insert.
    ///
    /// Returns true if the record was added. A known id is a no-op for the
    /// record itself, but the arrival is still used to catch counter drift.
    /// Tombstoned ids are dropped silently.
    pub fn insert(&mut self, notification: Notification) -> bool {
        if self.tombstones.contains(&notification.id) {
            debug!(id = %notification.id, "dropping event for deleted notification");
            return false;
        }
        if self.position(&notification.id).is_some() {
            self.verify_counters();
            return false;
        }
        if !notification.read {
            self.unread += 1;
        }
        *self
            .by_type
            .entry(notification.notification_type)
            .or_insert(0) += 1;
        self.records.insert(0, notification);
        self.bump();
        true
    }

    /// Monotonic unread -> read transition.
    ///
    /// Returns true only when a real transition happened; already-read and
    /// unknown ids are no-ops, so duplicate or stale read events can never
    /// decrement the unread counter twice.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                self.unread = self.unread.saturating_sub(1);
                self.bump();
                true
            }
            _ => false,
        }
    }

    /// Mark every unread record read. Returns the ids actually transitioned.
    pub fn mark_all_read(&mut self) -> Vec<String> {
        let mut transitioned = Vec::new();
        for n in self.records.iter_mut().filter(|n| !n.read) {
            n.read = true;
            transitioned.push(n.id.clone());
        }
        if !transitioned.is_empty() {
            self.unread = 0;
            self.bump();
        }
        transitioned
    }

    /// Terminal removal. Records a tombstone so later events referencing the
    /// id are ignored. Returns the position and record for rollback.
    pub fn remove(&mut self, id: &str) -> Option<(usize, Notification)> {
        let position = self.position(id)?;
        let record = self.records.remove(position);
        self.tombstones.insert(record.id.clone());
        if !record.read {
            self.unread = self.unread.saturating_sub(1);
        }
        if let Some(count) = self.by_type.get_mut(&record.notification_type) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.by_type.remove(&record.notification_type);
            }
        }
        self.bump();
        Some((position, record))
    }

    /// Rollback primitive: undo an optimistic mark-read.
    pub fn restore_unread(&mut self, id: &str) {
        if let Some(n) = self.records.iter_mut().find(|n| n.id == id) {
            if n.read {
                n.read = false;
                self.unread += 1;
                self.bump();
            }
        }
    }

    /// Rollback primitive: undo an optimistic delete, restoring the record
    /// at its original position and clearing the tombstone.
    pub fn reinsert(&mut self, position: usize, record: Notification) {
        self.tombstones.remove(&record.id);
        if !record.read {
            self.unread += 1;
        }
        *self
            .by_type
            .entry(record.notification_type)
            .or_insert(0) += 1;
        let position = position.min(self.records.len());
        self.records.insert(position, record);
        self.bump();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.records.iter().find(|n| n.id == id)
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.records.clone()
    }

    /// Aggregates from the running counters, O(1).
    pub fn stats(&self) -> NotificationStats {
        NotificationStats {
            total: self.records.len(),
            unread: self.unread,
            by_type: self.by_type.clone(),
        }
    }

    /// Aggregates recomputed from scratch, for drift checks.
    pub fn recompute_stats(&self) -> NotificationStats {
        let mut by_type: HashMap<NotificationType, usize> = HashMap::new();
        let mut unread = 0;
        for n in &self.records {
            *by_type.entry(n.notification_type).or_insert(0) += 1;
            if !n.read {
                unread += 1;
            }
        }
        NotificationStats {
            total: self.records.len(),
            unread,
            by_type,
        }
    }

    /// Adopt server-computed aggregates, correcting local drift.
    ///
    /// The server value wins on mismatch. Returns true if drift was found.
    pub fn reconcile(&mut self, server: &NotificationStats) -> bool {
        let mut drifted = false;
        if self.unread != server.unread {
            warn!(
                local = self.unread,
                server = server.unread,
                "unread count drift, adopting server value"
            );
            self.unread = server.unread;
            drifted = true;
        }
        if self.by_type != server.by_type {
            debug!("per-type count drift, adopting server values");
            self.by_type = server.by_type.clone();
            drifted = true;
        }
        if server.total != self.records.len() {
            debug!(
                local = self.records.len(),
                server = server.total,
                "record count differs from server, refresh needed"
            );
            drifted = true;
        }
        if drifted {
            self.bump();
        }
        drifted
    }

    /// Case-insensitive free-text match over title, message, and sender,
    /// for instant feedback without a server round trip.
    pub fn search(&self, text: &str) -> Vec<Notification> {
        let needle = text.to_lowercase();
        self.records
            .iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&needle)
                    || n.message.to_lowercase().contains(&needle)
                    || n.sender
                        .as_deref()
                        .map(|s| s.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn verify_counters(&mut self) {
        let recomputed = self.recompute_stats();
        if recomputed.unread != self.unread || recomputed.by_type != self.by_type {
            warn!(
                running_unread = self.unread,
                recomputed_unread = recomputed.unread,
                "counter drift detected, correcting"
            );
            self.unread = recomputed.unread;
            self.by_type = recomputed.by_type;
            self.bump();
        }
    }
}
