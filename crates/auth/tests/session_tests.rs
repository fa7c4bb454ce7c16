use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use voxpromo_auth::{
    Account, AccountId, AccountStore, Argon2Verifier, AuthError, Clock, FileSessionSlot,
    ManualClock, MemoryAccountStore, MemorySessionSlot, PasswordResetAck, SessionManager,
    SessionSlot, StoreError, StoreResult,
};

/// ストアを一時的に落とせるラッパー
struct FlakyStore {
    inner: MemoryAccountStore,
    down: AtomicBool,
    writes_down: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryAccountStore::new(),
            down: AtomicBool::new(false),
            writes_down: AtomicBool::new(false),
        }
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check()?;
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, account: Account) -> StoreResult<Account> {
        self.check()?;
        self.inner.insert(account).await
    }

    async fn update(&self, account: Account) -> StoreResult<Account> {
        self.check()?;
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write timeout".to_string()));
        }
        self.inner.update(account).await
    }

    async fn increment_creation_count(&self, id: &AccountId) -> StoreResult<Account> {
        self.check()?;
        self.inner.increment_creation_count(id).await
    }
}

fn manager(store: Arc<dyn AccountStore>, slot: Arc<dyn SessionSlot>) -> SessionManager {
    SessionManager::new(store, slot, b"integration-secret")
        .unwrap()
        .with_verifier(Arc::new(Argon2Verifier::with_params(1024, 1, 1).unwrap()))
}

#[tokio::test]
async fn test_register_twice_yields_one_account() {
    let store = Arc::new(MemoryAccountStore::new());
    let sessions = manager(store.clone(), Arc::new(MemorySessionSlot::new()));

    sessions.register("ana@example.com", "s3cret").await.unwrap();
    let err = sessions
        .register("ana@example.com", "different")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::EmailInUse));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let sessions = manager(
        Arc::new(MemoryAccountStore::new()),
        Arc::new(MemorySessionSlot::new()),
    );
    sessions.register("ana@example.com", "s3cret").await.unwrap();
    sessions.logout().await.unwrap();

    let wrong_secret = sessions.login("ana@example.com", "nope").await.unwrap_err();
    let unknown_email = sessions.login("bob@example.com", "s3cret").await.unwrap_err();

    assert!(matches!(wrong_secret, AuthError::InvalidCredentials));
    assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    assert_eq!(wrong_secret.to_string(), unknown_email.to_string());
    assert_eq!(sessions.current_user().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_then_logout_twice() {
    let sessions = manager(
        Arc::new(MemoryAccountStore::new()),
        Arc::new(MemorySessionSlot::new()),
    );
    let registered = sessions.register("ana@example.com", "s3cret").await.unwrap();
    sessions.logout().await.unwrap();

    let user = sessions.login("ana@example.com", "s3cret").await.unwrap();
    assert_eq!(user.id, registered.id);
    assert_eq!(sessions.current_user().await.unwrap(), Some(user));

    sessions.logout().await.unwrap();
    sessions.logout().await.unwrap();
    assert_eq!(sessions.current_user().await.unwrap(), None);
}

#[tokio::test]
async fn test_session_survives_restart_with_file_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store: Arc<dyn AccountStore> = Arc::new(MemoryAccountStore::new());

    let user = manager(store.clone(), Arc::new(FileSessionSlot::new(&path)))
        .register("ana@example.com", "s3cret")
        .await
        .unwrap();

    // 再起動後に別インスタンスで復元
    let restarted = manager(store, Arc::new(FileSessionSlot::new(&path)));
    assert_eq!(restarted.current_user().await.unwrap(), Some(user));
}

#[tokio::test]
async fn test_session_for_unknown_account_resolves_to_anonymous() {
    let slot = Arc::new(MemorySessionSlot::new());
    manager(Arc::new(MemoryAccountStore::new()), slot.clone())
        .register("ana@example.com", "s3cret")
        .await
        .unwrap();

    // 同じトークンを空のストアで解決する
    let sessions = manager(Arc::new(MemoryAccountStore::new()), slot.clone());
    assert_eq!(sessions.current_user().await.unwrap(), None);
    assert_eq!(slot.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_store_outage_is_transient_not_logged_out() {
    let store = Arc::new(FlakyStore::new());
    let slot = Arc::new(MemorySessionSlot::new());
    let sessions = manager(store.clone(), slot.clone());
    let user = sessions.register("ana@example.com", "s3cret").await.unwrap();

    store.down.store(true, Ordering::SeqCst);
    let err = sessions.current_user().await.unwrap_err();
    assert!(err.is_transient());
    assert!(slot.load().await.unwrap().is_some());

    let err = sessions.login("ana@example.com", "s3cret").await.unwrap_err();
    assert!(err.is_transient());

    store.down.store(false, Ordering::SeqCst);
    assert_eq!(sessions.current_user().await.unwrap(), Some(user));
}

#[tokio::test]
async fn test_lazy_expiration_is_visible_to_independent_reader() {
    let store = Arc::new(MemoryAccountStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let sessions = manager(store.clone(), Arc::new(MemorySessionSlot::new()))
        .with_clock(clock.clone());
    let user = sessions.register("ana@example.com", "s3cret").await.unwrap();

    let grant = sessions.grant_premium("123", clock.now()).await.unwrap();
    assert!(grant.user.is_premium);
    assert_eq!(
        grant.user.premium_expires_at,
        Some(Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap())
    );

    clock.advance(Duration::days(29));
    let current = sessions.current_user().await.unwrap().unwrap();
    assert!(!current.is_premium);

    let independent = store.find_by_id(&user.id).await.unwrap().unwrap();
    assert!(!independent.is_premium);
    assert_eq!(independent.premium_expires_at, None);
}

#[tokio::test]
async fn test_reset_password_ack_is_generic() {
    let sessions = manager(
        Arc::new(MemoryAccountStore::new()),
        Arc::new(MemorySessionSlot::new()),
    );
    sessions.register("ana@example.com", "s3cret").await.unwrap();

    let known = sessions.reset_password_request("ana@example.com").await.unwrap();
    let unknown = sessions.reset_password_request("bob@example.com").await.unwrap();

    assert_eq!(known, unknown);
    assert_eq!(known, PasswordResetAck::default());
}

#[tokio::test]
async fn test_creation_needs_session_and_known_account() {
    let sessions = manager(
        Arc::new(MemoryAccountStore::new()),
        Arc::new(MemorySessionSlot::new()),
    );
    assert!(matches!(
        sessions.record_creation(&AccountId::new()).await,
        Err(AuthError::NotFound(_))
    ));
    assert!(matches!(
        sessions.authorize_creation().await,
        Err(AuthError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_login_is_not_established_when_expiry_write_fails() {
    let store = Arc::new(FlakyStore::new());
    let slot = Arc::new(MemorySessionSlot::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let sessions = manager(store.clone(), slot.clone()).with_clock(clock.clone());

    sessions.register("ana@example.com", "s3cret").await.unwrap();
    sessions.grant_premium("pay-1", clock.now()).await.unwrap();
    sessions.logout().await.unwrap();
    clock.advance(Duration::days(30));

    store.writes_down.store(true, Ordering::SeqCst);
    let err = sessions.login("ana@example.com", "s3cret").await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(slot.load().await.unwrap(), None);
    assert_eq!(sessions.current_user().await.unwrap(), None);

    // 復旧後の再試行で期限切れが反映される
    store.writes_down.store(false, Ordering::SeqCst);
    let user = sessions.login("ana@example.com", "s3cret").await.unwrap();
    assert!(!user.is_premium);
    assert_eq!(user.premium_expires_at, None);
    assert_eq!(sessions.current_user().await.unwrap(), Some(user));
}
