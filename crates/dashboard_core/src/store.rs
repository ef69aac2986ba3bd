use std::sync::Arc;

use shared::domain::{NewUser, User, UserId};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    api::{ApiError, UserApi},
    DashboardEvent, UserAction,
};

/// Attempts per list fetch: the first try plus one automatic retry.
const LIST_FETCH_ATTEMPTS: usize = 2;

/// The list fetch failed on every attempt. Unlike mutation failures,
/// which are reported on the event channel, this is returned to the
/// caller and blocks the view.
#[derive(Debug, Clone, Error)]
#[error("failed to load users: {message}")]
pub struct LoadError {
    pub message: String,
}

/// The one cached user collection and every path that changes it.
///
/// Reads hand out the current `Arc`; changes build a fresh `Vec` and swap
/// it in, so a handed-out snapshot never mutates underneath its holder.
/// The version counter bumps on every swap and keys downstream
/// memoization. The state lock is never held across a network call.
pub struct UserStore {
    api: Arc<dyn UserApi>,
    inner: Mutex<StoreState>,
    events: broadcast::Sender<DashboardEvent>,
}

#[derive(Default)]
struct StoreState {
    users: Option<Arc<Vec<User>>>,
    version: u64,
}

impl UserStore {
    pub fn new(api: Arc<dyn UserApi>, events: broadcast::Sender<DashboardEvent>) -> Self {
        Self {
            api,
            inner: Mutex::new(StoreState::default()),
            events,
        }
    }

    /// The cached collection with its version, when one is present.
    pub async fn snapshot(&self) -> Option<(Arc<Vec<User>>, u64)> {
        let guard = self.inner.lock().await;
        guard
            .users
            .as_ref()
            .map(|users| (Arc::clone(users), guard.version))
    }

    pub async fn version(&self) -> u64 {
        self.inner.lock().await.version
    }

    /// Returns the cached collection, fetching it first when absent.
    pub async fn users(&self) -> Result<Arc<Vec<User>>, LoadError> {
        if let Some((users, _)) = self.snapshot().await {
            return Ok(users);
        }
        self.fetch_and_populate().await
    }

    /// Drops the cached collection; the next read fetches it again.
    pub async fn invalidate(&self) {
        let mut guard = self.inner.lock().await;
        if guard.users.take().is_some() {
            guard.version += 1;
        }
    }

    /// Forces a fresh fetch regardless of cache state.
    pub async fn refresh(&self) -> Result<Arc<Vec<User>>, LoadError> {
        self.invalidate().await;
        self.fetch_and_populate().await
    }

    async fn fetch_and_populate(&self) -> Result<Arc<Vec<User>>, LoadError> {
        let mut failure = String::from("user list unavailable");
        for attempt in 1..=LIST_FETCH_ATTEMPTS {
            match self.api.list().await {
                Ok(users) => {
                    let users = Arc::new(users);
                    {
                        let mut guard = self.inner.lock().await;
                        guard.users = Some(Arc::clone(&users));
                        guard.version += 1;
                    }
                    info!(total = users.len(), "user collection loaded");
                    let _ = self.events.send(DashboardEvent::CollectionLoaded {
                        total: users.len(),
                    });
                    return Ok(users);
                }
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts = LIST_FETCH_ATTEMPTS,
                        error = %err,
                        "user list fetch failed"
                    );
                    failure = err.to_string();
                }
            }
        }
        Err(LoadError { message: failure })
    }

    /// Creates a user remotely; on success the returned record is
    /// appended to the cached collection (or starts it when nothing is
    /// cached yet). Failures never propagate: the cache stays untouched
    /// and exactly one failure notification is emitted.
    pub async fn create(&self, draft: NewUser) {
        match self.api.create(&draft).await {
            Ok(created) => {
                let id = created.id;
                {
                    let mut guard = self.inner.lock().await;
                    let mut users = guard.users.as_deref().cloned().unwrap_or_default();
                    users.push(created);
                    guard.users = Some(Arc::new(users));
                    guard.version += 1;
                }
                info!(user_id = id.0, "user created");
                let _ = self.events.send(DashboardEvent::UserCreated { id });
            }
            Err(err) => self.report_failure(UserAction::Create, err),
        }
    }

    /// Updates a user remotely; on success the cached record with the
    /// same id is replaced by the server's returned object, all others
    /// untouched. Failure handling matches `create`.
    pub async fn update(&self, user: User) {
        match self.api.update(&user).await {
            Ok(updated) => {
                let id = updated.id;
                {
                    let mut guard = self.inner.lock().await;
                    if let Some(existing) = &guard.users {
                        let users = existing
                            .iter()
                            .map(|current| {
                                if current.id == id {
                                    updated.clone()
                                } else {
                                    current.clone()
                                }
                            })
                            .collect::<Vec<_>>();
                        guard.users = Some(Arc::new(users));
                        guard.version += 1;
                    }
                }
                info!(user_id = id.0, "user updated");
                let _ = self.events.send(DashboardEvent::UserUpdated { id });
            }
            Err(err) => self.report_failure(UserAction::Update, err),
        }
    }

    /// Deletes a user remotely; on success the whole collection is
    /// invalidated rather than spliced locally, so the next read
    /// refetches. Failure handling matches `create`.
    pub async fn delete(&self, id: UserId) {
        match self.api.delete(id).await {
            Ok(()) => {
                self.invalidate().await;
                info!(user_id = id.0, "user deleted, collection marked stale");
                let _ = self.events.send(DashboardEvent::UserDeleted { id });
            }
            Err(err) => self.report_failure(UserAction::Delete, err),
        }
    }

    fn report_failure(&self, action: UserAction, err: ApiError) {
        warn!(action = %action, error = %err, "user mutation failed");
        let _ = self.events.send(DashboardEvent::OperationFailed {
            action,
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
