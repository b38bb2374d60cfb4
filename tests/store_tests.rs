use chrono::{NaiveDate, NaiveDateTime};
use rassegna::blob::{BlobRepository, MemoryBlobRepository};
use rassegna::config::SecurityConfig;
use rassegna::models::{Account, AccountTable, ViewEntry};
use rassegna::password::{Argon2Hasher, CredentialHasher};
use rassegna::services::{
    AccountError, AccountService, AuthError, AuthService, BlobAccountService, BlobAuthService,
    LoginWarning, NewAccount, Session,
};
use rassegna::stats;
use rassegna::store::{ActivityLogStore, CredentialStore, StoreError};
use std::sync::Arc;

const ADMIN: &str = "admin";
const BOOTSTRAP: &str = "let-me-in-now";

fn fast_hasher() -> Arc<dyn CredentialHasher> {
    let config = SecurityConfig {
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        ..SecurityConfig::default()
    };
    Arc::new(Argon2Hasher::new(&config).unwrap())
}

fn credential_store(repo: &Arc<MemoryBlobRepository>) -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(
        repo.clone(),
        fast_hasher(),
        "users.csv",
        ADMIN,
    ))
}

fn at(date: &str, time: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
}

async fn hash(store: &CredentialStore, password: &str) -> String {
    store.hasher().hash(password).unwrap()
}

#[tokio::test]
async fn upsert_then_verify() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);

    let password_hash = hash(&store, "s3cret-pass").await;
    store.upsert("alice", &password_hash, None).await.unwrap();

    assert!(store.verify("alice", "s3cret-pass").await.unwrap());
    assert!(!store.verify("alice", "wrong").await.unwrap());
    assert!(!store.verify("nobody", "s3cret-pass").await.unwrap());
}

#[tokio::test]
async fn upsert_twice_keeps_one_account_with_latest_hash() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);

    let first = hash(&store, "first-password").await;
    let second = hash(&store, "second-password").await;
    store.upsert("alice", &first, Some("alice@example.org")).await.unwrap();
    store.upsert("alice", &second, None).await.unwrap();

    let table = store.load().await.unwrap();
    assert_eq!(table.len(), 1);
    let alice = &table["alice"];
    assert_eq!(alice.password_hash, second);
    assert!(alice.password_changed);
    assert_eq!(alice.email.as_deref(), Some("alice@example.org"));
    assert!(store.verify("alice", "second-password").await.unwrap());
    assert!(!store.verify("alice", "first-password").await.unwrap());
}

#[tokio::test]
async fn delete_removes_account() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);

    let h = hash(&store, "password-1").await;
    store.upsert(ADMIN, &h, None).await.unwrap();
    store.upsert("bob", &h, None).await.unwrap();

    assert!(store.delete("bob").await.unwrap());
    assert!(store.get("bob").await.unwrap().is_none());
    assert!(!store.delete("bob").await.unwrap());
}

#[tokio::test]
async fn deleting_administrator_leaves_store_untouched() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);

    let h = hash(&store, "password-1").await;
    store.upsert(ADMIN, &h, None).await.unwrap();
    let before = store.load().await.unwrap();

    let err = store.delete(ADMIN).await.unwrap_err();
    assert!(matches!(err, StoreError::GuardRejected(_)));
    assert_eq!(store.load().await.unwrap(), before);
}

#[tokio::test]
async fn saving_empty_table_is_refused() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);

    let h = hash(&store, "password-1").await;
    store.upsert("alice", &h, None).await.unwrap();

    let err = store.save(&AccountTable::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::GuardRejected(_)));
    assert_eq!(store.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn save_and_load_round_trip_preserves_empty_email() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);

    let modified = at("2024-05-01", "08:30:00");
    let mut table = AccountTable::new();
    table.insert(
        "alice".to_string(),
        Account {
            username: "alice".to_string(),
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            password_changed: true,
            last_modified: modified,
            email: Some("alice@example.org".to_string()),
        },
    );
    table.insert(
        "bob".to_string(),
        Account {
            username: "bob".to_string(),
            password_hash: "$argon2id$v=19$m=1024,t=1,p=1$c2FsdA$b3RoZXI".to_string(),
            password_changed: false,
            last_modified: modified,
            email: None,
        },
    );

    store.save(&table).await.unwrap();
    assert_eq!(store.load().await.unwrap(), table);
}

#[tokio::test]
async fn appending_same_view_twice_keeps_one_entry() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let log = ActivityLogStore::new(repo.clone(), "views.csv");
    let when = at("2025-01-31", "09:15:00");

    let first = log.append("bob", "rassegna_2025.01.31.pdf", when).await.unwrap();
    assert!(!first.duplicate);
    let second = log.append("bob", "rassegna_2025.01.31.pdf", when).await.unwrap();
    assert!(second.duplicate);

    let entries = log.read_all().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].username, "bob");
}

#[tokio::test]
async fn activity_log_survives_outage() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let log = ActivityLogStore::new(repo.clone(), "views.csv");

    log.append("bob", "a.pdf", at("2025-01-01", "10:00:00"))
        .await
        .unwrap();

    repo.set_online(false);
    let err = log
        .append("bob", "b.pdf", at("2025-01-02", "10:00:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));

    repo.set_online(true);
    assert_eq!(log.read_all().await.unwrap().len(), 1);
    assert_eq!(repo.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn break_glass_on_empty_store() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let auth = BlobAuthService::new(credential_store(&repo), Some(BOOTSTRAP.to_string()), 8);

    let outcome = auth.login(ADMIN, BOOTSTRAP).await.unwrap();
    assert!(outcome.session.is_administrator);
    assert_eq!(outcome.warning, Some(LoginWarning::StoreEmpty));

    let err = auth.login(ADMIN, "guess").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let err = auth.login("mallory", BOOTSTRAP).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn break_glass_disabled_without_secret() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let auth = BlobAuthService::new(credential_store(&repo), None, 8);

    let err = auth.login(ADMIN, BOOTSTRAP).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn break_glass_when_store_unreachable() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);
    let h = hash(&store, "bob-password").await;
    store.upsert("bob", &h, None).await.unwrap();

    let auth = BlobAuthService::new(store, Some(BOOTSTRAP.to_string()), 8);
    repo.set_online(false);

    let outcome = auth.login(ADMIN, BOOTSTRAP).await.unwrap();
    assert_eq!(outcome.warning, Some(LoginWarning::StoreUnreachable));

    let err = auth.login("bob", "bob-password").await.unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
}

#[tokio::test]
async fn corrupt_credential_table_is_never_overwritten() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let garbage = b"user;secret\n\x00\x01 not a credential table".to_vec();
    repo.put("users.csv", garbage.clone(), "text/csv").await.unwrap();

    let store = credential_store(&repo);
    let auth = BlobAuthService::new(store.clone(), Some(BOOTSTRAP.to_string()), 8);
    let accounts = BlobAccountService::new(
        store,
        &SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..SecurityConfig::default()
        },
    );

    assert!(matches!(
        auth.login(ADMIN, BOOTSTRAP).await.unwrap_err(),
        AuthError::Internal(_)
    ));
    assert!(matches!(
        auth.login("bob", "bob-password").await.unwrap_err(),
        AuthError::Internal(_)
    ));

    let admin = Session::new(ADMIN, ADMIN);
    assert!(matches!(
        accounts
            .bootstrap_administrator(&admin, "fresh-admin-pw", None)
            .await
            .unwrap_err(),
        AccountError::Internal(_)
    ));
    assert!(matches!(
        accounts
            .add_account(
                &admin,
                NewAccount {
                    username: ADMIN.to_string(),
                    password: Some("fresh-admin-pw".to_string()),
                    email: None,
                },
            )
            .await
            .unwrap_err(),
        AccountError::Internal(_)
    ));

    let blobs = repo.list(None).await.unwrap();
    assert_eq!(blobs.len(), 1);
    assert_eq!(repo.get(&blobs[0].id).await.unwrap(), garbage);
}

#[tokio::test]
async fn stored_administrator_logs_in_normally() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let store = credential_store(&repo);
    let h = hash(&store, "admin-password").await;
    store.upsert(ADMIN, &h, None).await.unwrap();

    let auth = BlobAuthService::new(store, Some(BOOTSTRAP.to_string()), 8);

    let outcome = auth.login(ADMIN, "admin-password").await.unwrap();
    assert!(outcome.session.is_administrator);
    assert!(outcome.warning.is_none());

    assert!(matches!(
        auth.login(ADMIN, BOOTSTRAP).await.unwrap_err(),
        AuthError::InvalidCredentials
    ));
}

fn view(date: &str, time: &str, user: &str, resource: &str) -> ViewEntry {
    ViewEntry::new(user, resource, at(date, time))
}

#[test]
fn trailing_window_keeps_last_thirty_days() {
    let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
    let entries = vec![
        view("2025-03-31", "23:59:59", "a", "x.pdf"),
        view("2025-03-02", "00:00:00", "b", "x.pdf"),
        view("2025-03-01", "23:59:59", "c", "x.pdf"),
        view("2025-04-01", "00:00:00", "d", "x.pdf"),
    ];

    let window = stats::within_trailing_days(&entries, today, 30);
    let users: Vec<&str> = window.iter().map(|e| e.username.as_str()).collect();
    assert_eq!(users, vec!["a", "b"]);
}

#[test]
fn top_resources_ranked_by_count() {
    let entries = vec![
        view("2025-03-01", "08:00:00", "a", "b.pdf"),
        view("2025-03-01", "09:00:00", "b", "b.pdf"),
        view("2025-03-01", "10:00:00", "c", "a.pdf"),
        view("2025-03-01", "11:00:00", "a", "c.pdf"),
        view("2025-03-01", "12:00:00", "b", "c.pdf"),
        view("2025-03-01", "13:00:00", "c", "c.pdf"),
    ];

    let counts = stats::count_by_resource(&entries);
    let top = stats::top_n(&counts, 2);
    assert_eq!(
        top,
        vec![("c.pdf".to_string(), 3), ("b.pdf".to_string(), 2)]
    );
}

#[tokio::test]
async fn logged_view_shows_up_in_top_resources() {
    let repo = Arc::new(MemoryBlobRepository::new("test"));
    let log = ActivityLogStore::new(repo, "views.csv");
    log.append("bob", "2025.01.01.pdf", at("2025-01-01", "07:45:00"))
        .await
        .unwrap();

    let entries = log.read_all().await.unwrap();
    let top = stats::top_n(&stats::count_by_resource(&entries), 10);
    assert_eq!(top, vec![("2025.01.01.pdf".to_string(), 1)]);
}
