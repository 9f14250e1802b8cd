//! Timing-sensitive behaviour, run on a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use rinkside_auth::{Action, AuthChange, Role};
use rinkside_infra::InMemoryAuthBackend;
use rinkside_session::{Phase, Readiness, SessionConfig, SessionMachine};

use common::{SilentBackend, SlowProfileStore, identity, session_for, wait_for};

fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{expected:?}, got {elapsed:?}"
    );
}

fn slow_machine() -> (
    SessionMachine<Arc<InMemoryAuthBackend>, Arc<SlowProfileStore>>,
    Arc<SlowProfileStore>,
) {
    rinkside_observability::init_for_tests();
    let store = Arc::new(SlowProfileStore::new());
    let machine = SessionMachine::new(
        Arc::new(InMemoryAuthBackend::new()),
        store.clone(),
        SessionConfig::default(),
    );
    (machine, store)
}

#[tokio::test(start_paused = true)]
async fn silent_backend_is_forced_ready_at_the_timeout() {
    rinkside_observability::init_for_tests();
    let machine = SessionMachine::new(
        Arc::new(SilentBackend::default()),
        Arc::new(SlowProfileStore::new()),
        SessionConfig::default(),
    );

    let start = Instant::now();
    let _listener = machine.bootstrap().unwrap();
    let snapshot = machine.wait_until_ready().await;

    assert_elapsed(start, Duration::from_secs(8));
    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Degraded));
    assert_eq!(snapshot.profile_completed, Some(false));
    assert!(!snapshot.loading);
    assert_eq!(
        machine.decide("/dashboard"),
        Action::RedirectLogin {
            from: "/dashboard".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn configured_timeout_is_honoured() {
    rinkside_observability::init_for_tests();
    let machine = SessionMachine::new(
        Arc::new(SilentBackend::default()),
        Arc::new(SlowProfileStore::new()),
        SessionConfig::default().with_resolve_timeout(Duration::from_millis(1500)),
    );

    let start = Instant::now();
    let _listener = machine.bootstrap().unwrap();
    machine.wait_until_ready().await;

    assert_elapsed(start, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn push_after_silent_bootstrap_still_resolves() {
    rinkside_observability::init_for_tests();
    let backend = Arc::new(SilentBackend::default());
    let machine = SessionMachine::new(
        backend.clone(),
        Arc::new(SlowProfileStore::new()),
        SessionConfig::default(),
    );
    let _listener = machine.bootstrap().unwrap();

    let user = identity("patient@example.ca");
    backend.push(AuthChange::signed_in(session_for(&user)));
    let snapshot = wait_for(&machine, |s| s.ready).await;

    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Authenticated));
    assert_eq!(snapshot.user_id(), Some(user.id));
}

#[tokio::test(start_paused = true)]
async fn slow_earlier_resolution_cannot_overwrite_newer_user() {
    let (machine, store) = slow_machine();
    let first = identity("first@example.ca");
    let second = identity("second@example.ca");
    store.delay(first.id, Duration::from_secs(3));
    store.delay(second.id, Duration::from_secs(1));

    let stale = machine.on_session_changed(Some(session_for(&first)));
    let latest = machine.on_session_changed(Some(session_for(&second)));
    let latest_stamp = latest.stamp();
    assert!(latest_stamp > stale.stamp());
    tokio::spawn(stale.run());
    tokio::spawn(latest.run());

    let ready = machine.wait_until_ready().await;
    assert_eq!(ready.user_id(), Some(second.id));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let settled = machine.snapshot();
    assert_eq!(settled.user_id(), Some(second.id));
    assert_eq!(settled.generation(), latest_stamp);
    assert!(!settled.degraded);
}

#[tokio::test(start_paused = true)]
async fn fast_earlier_resolution_does_not_mark_newer_user_ready() {
    let (machine, store) = slow_machine();
    let first = identity("first@example.ca");
    let second = identity("second@example.ca");
    store.delay(first.id, Duration::from_secs(1));
    store.delay(second.id, Duration::from_secs(3));

    tokio::spawn(machine.on_session_changed(Some(session_for(&first))).run());
    tokio::spawn(machine.on_session_changed(Some(session_for(&second))).run());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let midway = machine.snapshot();
    assert_eq!(midway.user_id(), Some(second.id));
    assert_eq!(midway.phase(), Phase::Resolving);
    assert_eq!(midway.profile_completed, None);

    let start = Instant::now();
    let ready = machine.wait_until_ready().await;
    assert_elapsed(start, Duration::from_secs(1));
    assert_eq!(ready.user_id(), Some(second.id));
    assert_eq!(ready.phase(), Phase::Ready(Readiness::Authenticated));
}

#[tokio::test(start_paused = true)]
async fn sign_out_during_resolution_wins() {
    let (machine, store) = slow_machine();
    let user = identity("quick-exit@example.ca");
    store.delay(user.id, Duration::from_secs(2));

    tokio::spawn(machine.on_session_changed(Some(session_for(&user))).run());
    machine.on_session_changed(None).run().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = machine.snapshot();
    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Anonymous));
    assert!(store.rows().get(user.id).is_some());
}

#[tokio::test(start_paused = true)]
async fn hanging_identity_switch_is_forced_ready_then_corrected() {
    let (machine, store) = slow_machine();
    let first = identity("first@example.ca");
    let second = identity("second@example.ca");
    store.delay(second.id, Duration::from_secs(60));

    machine.on_session_changed(Some(session_for(&first))).run().await;
    assert_eq!(machine.snapshot().phase(), Phase::Ready(Readiness::Authenticated));

    tokio::spawn(machine.on_session_changed(Some(session_for(&second))).run());
    let switching = machine.snapshot();
    assert_eq!(switching.user_id(), Some(second.id));
    assert!(!switching.ready);
    assert_eq!(switching.role, None);

    let start = Instant::now();
    let forced = machine.wait_until_ready().await;
    assert_elapsed(start, Duration::from_secs(8));
    assert_eq!(forced.phase(), Phase::Ready(Readiness::Degraded));
    assert_eq!(forced.user_id(), Some(second.id));
    assert_eq!(forced.profile_completed, Some(false));
    assert_eq!(machine.decide("/dashboard"), Action::RedirectCompleteProfile);

    let resolved = wait_for(&machine, |s| !s.degraded).await;
    assert_eq!(resolved.phase(), Phase::Ready(Readiness::Authenticated));
    assert_eq!(resolved.role, Some(Role::Participant));
}

#[tokio::test(start_paused = true)]
async fn identity_switch_while_resolving_keeps_the_original_deadline() {
    let (machine, store) = slow_machine();
    let first = identity("first@example.ca");
    let second = identity("second@example.ca");
    store.delay(first.id, Duration::from_secs(30));
    store.delay(second.id, Duration::from_secs(30));

    let start = Instant::now();
    tokio::spawn(machine.on_session_changed(Some(session_for(&first))).run());
    tokio::time::sleep(Duration::from_secs(5)).await;
    tokio::spawn(machine.on_session_changed(Some(session_for(&second))).run());

    let snapshot = machine.wait_until_ready().await;
    assert_elapsed(start, Duration::from_secs(8));
    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Degraded));
    assert_eq!(snapshot.user_id(), Some(second.id));
}

#[tokio::test(start_paused = true)]
async fn push_during_bootstrap_keeps_the_bootstrap_deadline() {
    rinkside_observability::init_for_tests();
    let backend = Arc::new(SilentBackend::default());
    let store = Arc::new(SlowProfileStore::new());
    let machine = SessionMachine::new(backend.clone(), store.clone(), SessionConfig::default());
    let user = identity("late-push@example.ca");
    store.delay(user.id, Duration::from_secs(600));

    let start = Instant::now();
    let _listener = machine.bootstrap().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    backend.push(AuthChange::signed_in(session_for(&user)));

    let snapshot = machine.wait_until_ready().await;
    assert_elapsed(start, Duration::from_secs(8));
    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Degraded));
    assert_eq!(snapshot.user_id(), Some(user.id));
}

#[tokio::test(start_paused = true)]
async fn repeated_token_refresh_cannot_postpone_the_timeout() {
    rinkside_observability::init_for_tests();
    let backend = Arc::new(SilentBackend::default());
    let store = Arc::new(SlowProfileStore::new());
    let machine = SessionMachine::new(backend.clone(), store.clone(), SessionConfig::default());
    let user = identity("chatty-tokens@example.ca");
    store.delay(user.id, Duration::from_secs(600));

    let start = Instant::now();
    let _listener = machine.bootstrap().unwrap();
    backend.push(AuthChange::signed_in(session_for(&user)));
    tokio::time::sleep(Duration::from_secs(5)).await;
    backend.push(AuthChange::token_refreshed(session_for(&user)));

    let snapshot = machine.wait_until_ready().await;
    assert_elapsed(start, Duration::from_secs(8));
    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Degraded));

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        backend.push(AuthChange::token_refreshed(session_for(&user)));
        tokio::task::yield_now().await;
        let snapshot = machine.snapshot();
        assert!(snapshot.ready);
        assert_eq!(snapshot.user_id(), Some(user.id));
    }
}

#[tokio::test(start_paused = true)]
async fn refresh_while_resolving_keeps_the_deadline() {
    let (machine, store) = slow_machine();
    let user = identity("refresher@example.ca");
    store.delay(user.id, Duration::from_secs(600));

    let start = Instant::now();
    tokio::spawn(machine.on_session_changed(Some(session_for(&user))).run());
    tokio::time::sleep(Duration::from_secs(5)).await;
    let refresher = machine.clone();
    tokio::spawn(async move { refresher.refresh().await });

    let snapshot = machine.wait_until_ready().await;
    assert_elapsed(start, Duration::from_secs(8));
    assert_eq!(snapshot.phase(), Phase::Ready(Readiness::Degraded));
    assert_eq!(snapshot.user_id(), Some(user.id));
}
