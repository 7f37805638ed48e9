//! Rollback commands for optimistic mutations.

use crate::store::{Notification, NotificationStore};

/// Inverse of an optimistic store mutation.
///
/// Captured before the transport call goes out; applied only when the call
/// fails. Holds values, not closures, so a failed mutation leaves an
/// inspectable record of what will be undone.
#[derive(Debug, Clone)]
pub enum MutationRollback {
    /// Undo a single optimistic mark-read.
    RestoreUnread(String),
    /// Undo an optimistic mark-all-read; holds the ids that transitioned.
    RestoreUnreadMany(Vec<String>),
    /// Undo an optimistic delete, restoring the record where it was.
    Reinsert {
        position: usize,
        record: Notification,
    },
}

impl MutationRollback {
    pub fn apply(self, store: &mut NotificationStore) {
        match self {
            MutationRollback::RestoreUnread(id) => store.restore_unread(&id),
            MutationRollback::RestoreUnreadMany(ids) => {
                for id in ids {
                    store.restore_unread(&id);
                }
            }
            MutationRollback::Reinsert { position, record } => store.reinsert(position, record),
        }
    }
}
