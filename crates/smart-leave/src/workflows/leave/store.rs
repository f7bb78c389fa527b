use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::directory::normalize;
use super::domain::{AppNotification, LeaveId, LeaveRequest, User, UserId};
use super::repository::{
    LeaveRepository, LeaveStore, NotificationRepository, RepositoryError, SessionRepository,
    UserRepository,
};

pub const STORE_NAMESPACE: &str = "smartleave";
pub const STORE_SCHEMA_VERSION: u32 = 20;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Tables {
    users: Vec<User>,
    leaves: Vec<LeaveRequest>,
    notifications: Vec<AppNotification>,
    session: Option<UserId>,
}

/// On-disk representation, tagged with the namespace so older layouts are
/// never read as the current one.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    namespace: String,
    schema_version: u32,
    #[serde(flatten)]
    tables: Tables,
}

/// In-process store for the four workflow tables, optionally mirrored to a
/// JSON snapshot file after every write.
#[derive(Debug, Default)]
pub struct InMemoryLeaveStore {
    tables: Mutex<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a snapshot-backed store. A missing file starts empty; a file from
    /// another namespace or schema version is ignored.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let tables = if path.exists() {
            load_snapshot(&path)?
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot_path: Some(path),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Applies `mutate` to a copy of the tables, writes the snapshot, and only
    /// then makes the copy visible. A failed mutation or snapshot write leaves
    /// the store as it was. Mutations check before they change anything, so
    /// without a snapshot they run on the live tables.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut Tables) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut tables = self.lock()?;
        if self.snapshot_path.is_none() {
            return mutate(&mut tables);
        }
        let mut next = tables.clone();
        let outcome = mutate(&mut next)?;
        self.persist(&next)?;
        *tables = next;
        Ok(outcome)
    }

    fn persist(&self, tables: &Tables) -> Result<(), RepositoryError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            namespace: STORE_NAMESPACE.to_string(),
            schema_version: STORE_SCHEMA_VERSION,
            tables: tables.clone(),
        };
        let body = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, body)
            .and_then(|_| fs::rename(&staging, path))
            .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        debug!(path = %path.display(), "store snapshot written");
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> Result<Tables, RepositoryError> {
    let raw = fs::read(path).map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
    let snapshot: Snapshot = serde_json::from_slice(&raw)
        .map_err(|err| RepositoryError::Unavailable(format!("corrupt snapshot: {err}")))?;

    if snapshot.namespace != STORE_NAMESPACE || snapshot.schema_version != STORE_SCHEMA_VERSION {
        warn!(
            path = %path.display(),
            namespace = %snapshot.namespace,
            schema_version = snapshot.schema_version,
            "ignoring snapshot from a different store namespace"
        );
        return Ok(Tables::default());
    }

    Ok(snapshot.tables)
}

impl UserRepository for InMemoryLeaveStore {
    fn upsert_user(&self, mut user: User) -> Result<User, RepositoryError> {
        self.commit(|tables| {
            let email = normalize(&user.email);
            let position = tables
                .users
                .iter()
                .position(|existing| normalize(&existing.email) == email);
            match position {
                Some(index) => {
                    user.id = tables.users[index].id.clone();
                    tables.users[index] = user.clone();
                }
                None => tables.users.push(user.clone()),
            }
            Ok(user)
        })
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables.users.iter().find(|user| &user.id == id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let target = normalize(email);
        let tables = self.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|user| normalize(&user.email) == target)
            .cloned())
    }

    fn users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.lock()?.users.clone())
    }
}

impl LeaveRepository for InMemoryLeaveStore {
    fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        self.commit(|tables| {
            if tables.leaves.iter().any(|existing| existing.id == leave.id) {
                return Err(RepositoryError::Conflict);
            }
            tables.leaves.push(leave.clone());
            Ok(leave)
        })
    }

    fn update_leave(&self, mut leave: LeaveRequest) -> Result<LeaveRequest, RepositoryError> {
        self.commit(|tables| {
            let stored = tables
                .leaves
                .iter_mut()
                .find(|existing| existing.id == leave.id)
                .ok_or(RepositoryError::NotFound)?;

            if stored.version != leave.version {
                return Err(RepositoryError::Stale {
                    stored: stored.version,
                    attempted: leave.version,
                });
            }

            leave.version += 1;
            *stored = leave.clone();
            Ok(leave)
        })
    }

    fn fetch_leave(&self, id: &LeaveId) -> Result<Option<LeaveRequest>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables.leaves.iter().find(|leave| &leave.id == id).cloned())
    }

    fn leaves(&self) -> Result<Vec<LeaveRequest>, RepositoryError> {
        let mut leaves = self.lock()?.leaves.clone();
        leaves.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(leaves)
    }
}

impl NotificationRepository for InMemoryLeaveStore {
    fn prepend_notification(&self, notification: AppNotification) -> Result<(), RepositoryError> {
        self.commit(|tables| {
            tables.notifications.insert(0, notification);
            Ok(())
        })
    }

    fn notifications_for(&self, user_id: &UserId) -> Result<Vec<AppNotification>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .notifications
            .iter()
            .filter(|notification| &notification.user_id == user_id)
            .cloned()
            .collect())
    }

    fn mark_all_read(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        self.commit(|tables| {
            let mut changed = 0;
            for notification in tables
                .notifications
                .iter_mut()
                .filter(|notification| &notification.user_id == user_id && !notification.is_read)
            {
                notification.is_read = true;
                changed += 1;
            }
            Ok(changed)
        })
    }
}

impl SessionRepository for InMemoryLeaveStore {
    fn current_session(&self) -> Result<Option<UserId>, RepositoryError> {
        Ok(self.lock()?.session.clone())
    }

    fn start_session(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.commit(|tables| {
            tables.session = Some(user_id);
            Ok(())
        })
    }

    fn end_session(&self) -> Result<(), RepositoryError> {
        self.commit(|tables| {
            tables.session = None;
            Ok(())
        })
    }
}

impl LeaveStore for InMemoryLeaveStore {
    fn clear_all(&self) -> Result<(), RepositoryError> {
        self.commit(|tables| {
            *tables = Tables::default();
            Ok(())
        })
    }
}
