use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;
use shared::{
    domain::{NewUser, User, UserId},
    query::{PageRequest, SortDirective, SortField},
};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

pub mod api;
pub mod debounce;
pub mod store;
pub mod view;

use api::UserApi;
use debounce::Debouncer;
use store::{LoadError, UserStore};
use view::derive_page;

/// Rows per page when the caller does not choose one.
pub const DEFAULT_PAGE_SIZE: u32 = 5;
/// Quiet window between the last keystroke and the search taking effect.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Session notifications, broadcast to every subscriber. Mutation
/// outcomes arrive here and only here; the mutation methods themselves
/// never return errors.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    CollectionLoaded { total: usize },
    SearchApplied { text: String },
    UserCreated { id: UserId },
    UserUpdated { id: UserId },
    UserDeleted { id: UserId },
    OperationFailed { action: UserAction, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserAction::Create => "create user",
            UserAction::Update => "update user",
            UserAction::Delete => "delete user",
        })
    }
}

/// The snapshot a presentation layer renders: one derived page plus the
/// pagination facts around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardPage {
    pub users: Vec<User>,
    pub total_matched: usize,
    pub page: u32,
    pub page_count: u32,
    pub page_size: u32,
}

impl DashboardPage {
    /// 1-based bounds for a "showing X to Y of Z results" footer;
    /// `(0, 0)` when nothing matched.
    pub fn display_range(&self) -> (usize, usize) {
        if self.users.is_empty() {
            return (0, 0);
        }
        let start = (self.page as usize - 1) * self.page_size as usize + 1;
        let end = start + self.users.len() - 1;
        (start, end)
    }
}

struct ViewState {
    search_input: String,
    applied_search: String,
    sort: SortDirective,
    page: u32,
    page_size: u32,
    memo: Option<Memo>,
}

/// Exact inputs a derived page was computed from. While the key matches,
/// the memoized page is reused instead of recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewKey {
    version: u64,
    search: String,
    sort: SortDirective,
    page: u32,
    page_size: u32,
}

struct Memo {
    key: ViewKey,
    page: DashboardPage,
}

/// One admin-dashboard session: the cached collection, the debounced
/// search filter, the sort and page selection, and the event channel a
/// presentation layer observes.
///
/// Everything is driven through intent methods; `current_page` assembles
/// what should be on screen. State lives behind one async mutex and is
/// never held across a network call.
pub struct Dashboard {
    store: UserStore,
    search: Debouncer<String>,
    inner: Arc<Mutex<ViewState>>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn UserApi>) -> Arc<Self> {
        Self::new_with_settings(api, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE)
    }

    /// Must be called from within a tokio runtime: the session spawns a
    /// task that applies debounced search values.
    pub fn new_with_settings(
        api: Arc<dyn UserApi>,
        page_size: u32,
        search_debounce: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        let (search, mut applied_rx) = Debouncer::<String>::new(search_debounce);
        let inner = Arc::new(Mutex::new(ViewState {
            search_input: String::new(),
            applied_search: String::new(),
            sort: SortDirective::default(),
            page: 1,
            page_size: page_size.max(1),
            memo: None,
        }));

        // The task holds only the view state and the event sender, so it
        // winds down once the session (and with it the debouncer's send
        // side) is dropped.
        {
            let inner = Arc::clone(&inner);
            let events = events.clone();
            tokio::spawn(async move {
                while let Some(text) = applied_rx.recv().await {
                    let changed = {
                        let mut state = inner.lock().await;
                        if state.applied_search == text {
                            false
                        } else {
                            state.applied_search = text.clone();
                            state.page = 1;
                            true
                        }
                    };
                    if changed {
                        info!(search = %text, "search filter applied");
                        let _ = events.send(DashboardEvent::SearchApplied { text });
                    }
                }
            });
        }

        Arc::new(Self {
            store: UserStore::new(api, events.clone()),
            search,
            inner,
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    /// Records the raw input and feeds the debouncer; the filter takes
    /// effect only after the quiet window, and only the trailing value of
    /// a burst is ever applied.
    pub async fn set_search(&self, text: impl Into<String>) {
        let text = text.into();
        {
            let mut state = self.inner.lock().await;
            state.search_input = text.clone();
        }
        self.search.submit(text);
    }

    /// The search text as last typed, which may not be applied yet.
    pub async fn search_input(&self) -> String {
        self.inner.lock().await.search_input.clone()
    }

    /// The search text the current view is actually filtered by.
    pub async fn applied_search(&self) -> String {
        self.inner.lock().await.applied_search.clone()
    }

    /// Column-header rule: selecting the active field flips its
    /// direction, selecting a new field starts ascending.
    pub async fn toggle_sort(&self, field: SortField) {
        let mut state = self.inner.lock().await;
        if state.sort.field == field {
            state.sort.direction = state.sort.direction.toggled();
        } else {
            state.sort = SortDirective::ascending(field);
        }
    }

    pub async fn set_sort(&self, sort: SortDirective) {
        self.inner.lock().await.sort = sort;
    }

    pub async fn sort(&self) -> SortDirective {
        self.inner.lock().await.sort
    }

    /// Selects a 1-based page. Values above the last page are accepted
    /// here and clamped when the next snapshot is assembled.
    pub async fn set_page(&self, page: u32) {
        self.inner.lock().await.page = page.max(1);
    }

    pub async fn page(&self) -> u32 {
        self.inner.lock().await.page
    }

    /// Looks a user up by id in the full collection, loading it first if
    /// needed. Edit intents prefill from this.
    pub async fn find_user(&self, id: UserId) -> Result<Option<User>, LoadError> {
        let users = self.store.users().await?;
        Ok(users.iter().find(|user| user.id == id).cloned())
    }

    /// The outcome arrives as a `UserCreated` or `OperationFailed` event.
    pub async fn create_user(&self, draft: NewUser) {
        self.store.create(draft).await;
    }

    /// The outcome arrives as a `UserUpdated` or `OperationFailed` event.
    pub async fn update_user(&self, user: User) {
        self.store.update(user).await;
    }

    /// The outcome arrives as a `UserDeleted` or `OperationFailed` event.
    pub async fn delete_user(&self, id: UserId) {
        self.store.delete(id).await;
    }

    /// Drops the cached collection and fetches it again.
    pub async fn refresh(&self) -> Result<(), LoadError> {
        self.store.refresh().await?;
        Ok(())
    }

    /// Assembles the page the presentation should show, loading the
    /// collection on first use (with its one automatic retry).
    ///
    /// The selected page is clamped into the derived range and written
    /// back, so when the filtered set shrinks the view lands on the last
    /// remaining page rather than an empty one. Repeated calls with
    /// unchanged inputs return the memoized snapshot.
    pub async fn current_page(&self) -> Result<DashboardPage, LoadError> {
        let (users, version) = loop {
            if let Some(snapshot) = self.store.snapshot().await {
                break snapshot;
            }
            self.store.users().await?;
        };

        let mut state = self.inner.lock().await;
        loop {
            let request = PageRequest::new(state.page, state.page_size);
            let key = ViewKey {
                version,
                search: state.applied_search.clone(),
                sort: state.sort,
                page: request.page(),
                page_size: request.page_size(),
            };
            if let Some(memo) = &state.memo {
                if memo.key == key {
                    return Ok(memo.page.clone());
                }
            }

            let derived = derive_page(&users, &key.search, key.sort, request);
            let page_count = page_count(derived.total_matched, request.page_size());
            if request.page() > page_count {
                state.page = page_count;
                continue;
            }

            let page = DashboardPage {
                users: derived.items,
                total_matched: derived.total_matched,
                page: request.page(),
                page_count,
                page_size: request.page_size(),
            };
            state.memo = Some(Memo {
                key,
                page: page.clone(),
            });
            return Ok(page);
        }
    }
}

fn page_count(total_matched: usize, page_size: u32) -> u32 {
    total_matched.div_ceil(page_size as usize).max(1) as u32
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
