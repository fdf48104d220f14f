//! Gateway integration tests: login state machine, session supersede and
//! expiry, the authorization gate, and the topic subscription bridge.
//! These exercise positive and negative paths against the library surface
//! with the in-memory store and broker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use caregate::broker::{sensor_topic, MemoryBroker};
use caregate::error::{AccessError, AuthError, CheckError, LoginError, SessionError, TokenError};
use caregate::identity::{
    authorize_topic_access, AuthService, LoginRequest, Principal, SessionCache, TokenCodec,
};
use caregate::store::{Account, AccountRole, Gender, MemoryStore};

fn account(id: &str, phone: &str, password: &str, role: AccountRole) -> Account {
    Account {
        id: id.into(),
        phone: phone.into(),
        password_hash: caregate::security::hash_password(password).unwrap(),
        nickname: format!("nick-{id}"),
        gender: Gender::Female,
        role,
        portrait: None,
        register_date: Utc::now(),
    }
}

/// Elder u1001 (phone 123456), guardian u2001 linked to it, unrelated elder
/// u3001.
fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_account(account("u1001", "123456", "123456", AccountRole::Elder));
    store.add_account(account("u2001", "654321", "654321", AccountRole::Guardian));
    store.add_account(account("u3001", "111222", "111222", AccountRole::Elder));
    store.link_guardian("u1001", "u2001");
    store
}

fn service_with_ttl(store: Arc<MemoryStore>, broker: Arc<MemoryBroker>, ttl: Duration) -> AuthService {
    AuthService::new(
        store,
        broker,
        SessionCache::new(ttl),
        TokenCodec::new(TokenCodec::random_key()),
    )
}

fn service(store: Arc<MemoryStore>, broker: Arc<MemoryBroker>) -> AuthService {
    service_with_ttl(store, broker, Duration::from_secs(60))
}

#[tokio::test]
async fn login_then_validate_succeeds() -> Result<()> {
    let svc = service(seeded_store(), Arc::new(MemoryBroker::new()));

    let resp = svc.login(&LoginRequest { phone: "123456".into(), password: "123456".into() }).await?;
    assert!(!resp.token.is_empty(), "login must return a non-empty token");

    let caller = svc.authenticate(&resp.token).expect("freshly issued token must validate");
    assert_eq!(caller.account_id, "u1001");
    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_unknown_users() {
    let svc = service(seeded_store(), Arc::new(MemoryBroker::new()));

    let wrong = svc.login(&LoginRequest { phone: "123456".into(), password: "nope".into() }).await;
    assert!(matches!(wrong, Err(LoginError::IncorrectPassword)));

    let unknown = svc.login(&LoginRequest { phone: "000000".into(), password: "123456".into() }).await;
    assert!(matches!(unknown, Err(LoginError::UserNotFound)));
}

#[tokio::test]
async fn guardian_role_cannot_use_device_login() {
    let svc = service(seeded_store(), Arc::new(MemoryBroker::new()));

    let res = svc.login(&LoginRequest { phone: "654321".into(), password: "654321".into() }).await;
    assert!(matches!(res, Err(LoginError::RoleNotPermitted)));
}

#[tokio::test]
async fn second_login_invalidates_first_token() -> Result<()> {
    let svc = service(seeded_store(), Arc::new(MemoryBroker::new()));
    let req = LoginRequest { phone: "123456".into(), password: "123456".into() };

    let first = svc.login(&req).await?;
    let second = svc.login(&req).await?;
    assert_ne!(first.token, second.token);

    let stale = svc.authenticate(&first.token);
    assert!(matches!(stale, Err(AuthError::Session(SessionError::TokenMismatch))));
    assert!(svc.authenticate(&second.token).is_ok());
    Ok(())
}

#[tokio::test]
async fn session_slides_on_use_and_expires_when_idle() -> Result<()> {
    let svc = service_with_ttl(
        seeded_store(),
        Arc::new(MemoryBroker::new()),
        Duration::from_millis(200),
    );
    let resp = svc.login(&LoginRequest { phone: "123456".into(), password: "123456".into() }).await?;

    // Used more often than the ttl, the session stays alive past several
    // multiples of it.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(svc.authenticate(&resp.token).is_ok(), "use within ttl must extend the session");
    }

    // Idle past the ttl, it dies.
    tokio::time::sleep(Duration::from_millis(350)).await;
    let expired = svc.authenticate(&resp.token);
    assert!(matches!(expired, Err(AuthError::Session(SessionError::Expired))));
    Ok(())
}

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_session() -> Result<()> {
    let svc = service(seeded_store(), Arc::new(MemoryBroker::new()));
    let resp = svc.login(&LoginRequest { phone: "123456".into(), password: "123456".into() }).await?;

    svc.logout(&resp.token)?;
    svc.logout(&resp.token)?; // second logout never errors

    let dead = svc.authenticate(&resp.token);
    assert!(matches!(dead, Err(AuthError::Session(SessionError::NoSession))));
    Ok(())
}

#[tokio::test]
async fn logout_then_check_fails_unauthorized() -> Result<()> {
    let broker = Arc::new(MemoryBroker::new());
    let svc = service(seeded_store(), broker.clone());
    let resp = svc.login(&LoginRequest { phone: "123456".into(), password: "123456".into() }).await?;

    svc.logout(&resp.token)?;
    let res = svc.check_login(&resp.token, "u1001").await;
    assert!(matches!(res, Err(CheckError::Auth(AuthError::Session(SessionError::NoSession)))));
    assert!(broker.subscriptions().is_empty(), "no subscription without a live session");
    Ok(())
}

#[tokio::test]
async fn forged_token_is_rejected_as_malformed() {
    let svc = service(seeded_store(), Arc::new(MemoryBroker::new()));

    // Token signed under a different key decodes to nothing here.
    let foreign = TokenCodec::new(TokenCodec::random_key()).issue("u1001");
    let res = svc.authenticate(&foreign);
    assert!(matches!(res, Err(AuthError::Token(TokenError::Malformed))));

    let garbage = svc.authenticate("not-a-token");
    assert!(matches!(garbage, Err(AuthError::Token(TokenError::Malformed))));
}

#[tokio::test]
async fn check_login_subscribes_the_caller_to_its_own_topic() -> Result<()> {
    let broker = Arc::new(MemoryBroker::new());
    let svc = service(seeded_store(), broker.clone());
    let resp = svc.login(&LoginRequest { phone: "123456".into(), password: "123456".into() }).await?;

    svc.check_login(&resp.token, "u1001").await.expect("self check must pass");
    assert!(broker.is_subscribed("u1001", &sensor_topic("u1001")));
    assert_eq!(broker.subscriptions()[0].2, 1, "sensor reports are qos 1");
    Ok(())
}

#[tokio::test]
async fn check_login_rejects_a_claimed_identifier_that_is_not_the_callers() -> Result<()> {
    let broker = Arc::new(MemoryBroker::new());
    let svc = service(seeded_store(), broker.clone());
    let resp = svc.login(&LoginRequest { phone: "123456".into(), password: "123456".into() }).await?;

    let res = svc.check_login(&resp.token, "u3001").await;
    assert!(matches!(res, Err(CheckError::Auth(AuthError::IdentityMismatch))));
    assert!(broker.subscriptions().is_empty());
    Ok(())
}

#[tokio::test]
async fn gate_allows_guardian_and_self_but_not_strangers() -> Result<()> {
    let store = seeded_store();

    // Guardian u2001 is linked to elder u1001.
    authorize_topic_access(store.as_ref(), &Principal::new("u2001"), "u1001")
        .await
        .expect("linked guardian must be allowed");

    // Self-access is always allowed, edges or not.
    authorize_topic_access(store.as_ref(), &Principal::new("u3001"), "u3001")
        .await
        .expect("self access must be allowed");

    // An unrelated account is denied.
    let stranger = authorize_topic_access(store.as_ref(), &Principal::new("u3001"), "u1001").await;
    assert!(matches!(stranger, Err(AccessError::NotGuardian)));

    // The edge is one-way: the elder is not a guardian of its guardian.
    let reverse = authorize_topic_access(store.as_ref(), &Principal::new("u1001"), "u2001").await;
    assert!(matches!(reverse, Err(AccessError::NotGuardian)));
    Ok(())
}
