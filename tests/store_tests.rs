/// User store integration tests
///
/// Exercises the persistence operations against an in-memory SQLite backend.
/// Run with: cargo test --test store_tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use userstore::core::Row;
use userstore::query::Statement;
use userstore::{
    Record, Result, SortOrder, SqliteBackend, StorageBackend, StoreConfig, StoreError, UserQuery,
    UserStore,
};

/// Counts writes so tests can assert that nothing reached the table.
struct CountingBackend {
    inner: SqliteBackend,
    writes: AtomicUsize,
}

impl CountingBackend {
    fn new() -> Self {
        Self {
            inner: SqliteBackend::open_in_memory().unwrap(),
            writes: AtomicUsize::new(0),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for CountingBackend {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(statement).await
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.inner.query(statement).await
    }
}

async fn store() -> UserStore {
    userstore::open_in_memory(StoreConfig::default()).await.unwrap()
}

async fn create_user(store: &UserStore, email: &str, status: &str) -> Record {
    let mut user = Record::new_user();
    user.set_email(email).set_status(status);
    store.user_create(&mut user).await.unwrap();
    user
}

#[tokio::test]
async fn test_create_and_read_by_id() {
    let store = store().await;
    let user = create_user(&store, "ada@example.com", "active").await;

    assert!(!user.is_dirty());
    assert!(!user.created_at().is_empty());
    assert_eq!(user.created_at(), user.updated_at());

    let loaded = store.user_find_by_id(user.id()).await.unwrap().unwrap();
    assert_eq!(loaded.email(), "ada@example.com");
    assert_eq!(loaded.status(), "active");
    assert!(!loaded.is_soft_deleted());
    assert!(!loaded.is_dirty());
}

#[tokio::test]
async fn test_read_by_empty_id_is_invalid() {
    let store = store().await;
    let err = store.user_find_by_id("").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_read_missing_id_returns_none() {
    let store = store().await;
    assert!(store.user_find_by_id("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_requires_id() {
    let store = store().await;
    let mut user = Record::new();
    user.set_email("x@example.com");
    let err = store.user_create(&mut user).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_count_by_status() {
    let store = store().await;
    for i in 0..3 {
        create_user(&store, &format!("a{i}@example.com"), "active").await;
    }
    for i in 0..2 {
        create_user(&store, &format!("i{i}@example.com"), "inactive").await;
    }

    assert_eq!(store.user_count(&UserQuery::new().status("active")).await.unwrap(), 3);
    assert_eq!(store.user_count(&UserQuery::new()).await.unwrap(), 5);
    assert_eq!(
        store
            .user_count(&UserQuery::new().status_in(["active", "inactive"]))
            .await
            .unwrap(),
        5
    );
    assert_eq!(store.user_count(&UserQuery::new().status("deleted")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_count_ignores_paging() {
    let store = store().await;
    for i in 0..4 {
        create_user(&store, &format!("u{i}@example.com"), "active").await;
    }

    let query = UserQuery::new().limit(2).unwrap().offset(1).unwrap();
    assert_eq!(store.user_count(&query).await.unwrap(), 4);
    assert_eq!(store.user_list(&query).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_find_by_email_or_create_is_idempotent() {
    let store = store().await;

    let first = store
        .user_find_by_email_or_create("bob@example.com", "unverified")
        .await
        .unwrap();
    let second = store
        .user_find_by_email_or_create("bob@example.com", "active")
        .await
        .unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(second.status(), "unverified");
    assert_eq!(store.user_count(&UserQuery::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_find_by_email() {
    let store = store().await;
    let user = create_user(&store, "carol@example.com", "active").await;

    let found = store.user_find_by_email("carol@example.com").await.unwrap().unwrap();
    assert_eq!(found.id(), user.id());
    assert!(store.user_find_by_email("dave@example.com").await.unwrap().is_none());
    assert!(store.user_find_by_email("").await.is_err());
}

#[tokio::test]
async fn test_update_persists_changed_columns() {
    let store = store().await;
    let mut user = create_user(&store, "eve@example.com", "unverified").await;

    user.set_status("active").set_first_name("Eve");
    assert_eq!(user.changed_columns().len(), 2);
    store.user_update(&mut user).await.unwrap();
    assert!(!user.is_dirty());

    let loaded = store.user_find_by_id(user.id()).await.unwrap().unwrap();
    assert!(loaded.is_active());
    assert_eq!(loaded.first_name(), "Eve");
    assert_eq!(loaded.email(), "eve@example.com");
}

#[tokio::test]
async fn test_update_without_changes_issues_no_write() {
    let backend = Arc::new(CountingBackend::new());
    let store = UserStore::new(StoreConfig::default())
        .unwrap()
        .with_backend(backend.clone());
    store.auto_migrate().await.unwrap();

    let mut user = Record::new_user();
    user.set_email("frank@example.com");
    store.user_create(&mut user).await.unwrap();
    let writes = backend.writes();

    store.user_update(&mut user).await.unwrap();
    assert_eq!(backend.writes(), writes);

    // Re-setting a column to its stored value is not a change either.
    let email = user.email().to_string();
    user.set_email(email);
    store.user_update(&mut user).await.unwrap();
    assert_eq!(backend.writes(), writes);

    user.set_memo("vip");
    store.user_update(&mut user).await.unwrap();
    assert_eq!(backend.writes(), writes + 1);
}

#[tokio::test]
async fn test_update_columns_rejects_id() {
    let store = store().await;
    let mut user = create_user(&store, "gina@example.com", "active").await;

    let proposed = [("id".to_string(), "other".to_string())].into_iter().collect();
    let err = store.user_update_columns(&mut user, &proposed).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_soft_delete_hides_user() {
    let store = store().await;
    let mut user = create_user(&store, "hank@example.com", "active").await;
    let other = create_user(&store, "ivy@example.com", "active").await;

    store.user_soft_delete(&mut user).await.unwrap();
    assert!(user.is_soft_deleted());

    assert!(store.user_find_by_id(user.id()).await.unwrap().is_none());
    assert!(store.user_find_by_id(other.id()).await.unwrap().is_some());
    assert_eq!(store.user_count(&UserQuery::new()).await.unwrap(), 1);

    let all = store
        .user_list(&UserQuery::new().with_soft_deleted(true))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_soft_delete_by_id() {
    let store = store().await;
    let user = create_user(&store, "jack@example.com", "active").await;

    assert!(store.user_soft_delete_by_id(user.id()).await.unwrap());
    assert!(!store.user_soft_delete_by_id(user.id()).await.unwrap());
    assert!(!store.user_soft_delete_by_id("missing").await.unwrap());
}

#[tokio::test]
async fn test_hard_delete() {
    let store = store().await;
    let user = create_user(&store, "kim@example.com", "active").await;
    let other = create_user(&store, "lee@example.com", "active").await;

    store.user_delete(&user).await.unwrap();
    store.user_delete_by_id(other.id()).await.unwrap();

    let all = store
        .user_list(&UserQuery::new().with_soft_deleted(true))
        .await
        .unwrap();
    assert!(all.is_empty());
    assert!(store.user_delete_by_id("").await.is_err());
}

#[tokio::test]
async fn test_list_ordering_and_paging() {
    let store = store().await;
    for name in ["b", "d", "a", "c", "e"] {
        create_user(&store, &format!("{name}@example.com"), "active").await;
    }

    let query = UserQuery::new()
        .order_by("email")
        .unwrap()
        .sort_order(SortOrder::Asc)
        .limit(2)
        .unwrap()
        .offset(1)
        .unwrap();
    let page: Vec<String> = store
        .user_list(&query)
        .await
        .unwrap()
        .iter()
        .map(|u| u.email().to_string())
        .collect();
    assert_eq!(page, vec!["b@example.com", "c@example.com"]);

    let desc = UserQuery::new().order_by("email").unwrap().sort_order(SortOrder::Desc);
    let first = store.user_list(&desc).await.unwrap();
    assert_eq!(first[0].email(), "e@example.com");
    assert_eq!(first.len(), 5);
}

#[tokio::test]
async fn test_list_by_id_set() {
    let store = store().await;
    let a = create_user(&store, "a@example.com", "active").await;
    let b = create_user(&store, "b@example.com", "active").await;
    create_user(&store, "c@example.com", "active").await;

    let users = store
        .user_list(&UserQuery::new().id_in([a.id(), b.id()]))
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    // An empty set does not filter.
    let users = store
        .user_list(&UserQuery::new().id_in(Vec::<String>::new()))
        .await
        .unwrap();
    assert_eq!(users.len(), 3);
}

#[tokio::test]
async fn test_created_at_range() {
    let store = store().await;
    create_user(&store, "m@example.com", "active").await;

    let now = Utc::now();
    let in_range = UserQuery::new()
        .created_at_gte(now - Duration::hours(1))
        .created_at_lte(now + Duration::hours(1));
    assert_eq!(store.user_count(&in_range).await.unwrap(), 1);

    let future = UserQuery::new().created_at_gte(now + Duration::hours(1));
    assert_eq!(store.user_count(&future).await.unwrap(), 0);
}

#[tokio::test]
async fn test_without_backend_storage_is_unavailable() {
    let store = UserStore::new(StoreConfig::default()).unwrap();

    let err = store.user_find_by_id("abc").await.unwrap_err();
    assert!(matches!(err, StoreError::StorageUnavailable));

    let err = store.user_count(&UserQuery::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::StorageUnavailable));

    let mut user = Record::new_user();
    let err = store.user_create(&mut user).await.unwrap_err();
    assert!(matches!(err, StoreError::StorageUnavailable));
}

#[tokio::test]
async fn test_automigrate_on_first_use() {
    let store = UserStore::new(StoreConfig::new("members").automigrate(true))
        .unwrap()
        .with_backend(Arc::new(SqliteBackend::open_in_memory().unwrap()));

    let user = create_user(&store, "auto@example.com", "active").await;
    assert!(store.user_find_by_id(user.id()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let err = UserStore::new(StoreConfig::new("users; DROP TABLE users")).err().unwrap();
    assert!(matches!(err, StoreError::Config(_)));
}

#[tokio::test]
async fn test_reopen_on_disk_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");

    let id = {
        let store = UserStore::new(StoreConfig::default())
            .unwrap()
            .with_backend(Arc::new(SqliteBackend::open(&path).unwrap()));
        store.auto_migrate().await.unwrap();
        create_user(&store, "disk@example.com", "active").await.id().to_string()
    };

    let store = UserStore::new(StoreConfig::default())
        .unwrap()
        .with_backend(Arc::new(SqliteBackend::open(&path).unwrap()));
    store.auto_migrate().await.unwrap();

    let loaded = store.user_find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(loaded.email(), "disk@example.com");
}
