//! Registry invariants: index allocation, capacity, close/reap idempotence

use smux_pty::PtyRead;
use smux_session::{SessionError, SessionRegistry, MAX_SESSIONS};
use smux_test_utils::TestFixtures;
use std::time::{Duration, Instant};

#[test]
fn test_first_spawn_gets_index_one() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.cat_target().unwrap();

    let mut registry = SessionRegistry::new();
    let index = registry.spawn_session(&target, 24, 80).unwrap();
    assert_eq!(index, 1);
    assert_eq!(registry.indices(), vec![1]);

    registry.close_session(1);
    assert!(registry.is_empty());
}

#[test]
fn test_indices_are_distinct_and_bounded() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.cat_target().unwrap();

    let mut registry = SessionRegistry::new();
    for _ in 0..MAX_SESSIONS {
        registry.spawn_session(&target, 24, 80).unwrap();
    }

    let indices = registry.indices();
    assert_eq!(indices, (1..=MAX_SESSIONS).collect::<Vec<_>>());

    for index in indices {
        registry.close_session(index);
    }
    assert!(registry.is_empty());
}

#[test]
fn test_spawn_beyond_capacity_fails_without_side_effects() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.cat_target().unwrap();

    let mut registry = SessionRegistry::new();
    for _ in 0..MAX_SESSIONS {
        registry.spawn_session(&target, 24, 80).unwrap();
    }

    let err = registry.spawn_session(&target, 24, 80).unwrap_err();
    assert!(matches!(
        err,
        SessionError::TableFull | SessionError::NoFreeIndex
    ));

    // Existing sessions untouched
    assert_eq!(registry.len(), MAX_SESSIONS);
    assert_eq!(registry.indices(), (1..=MAX_SESSIONS).collect::<Vec<_>>());

    for index in registry.indices() {
        registry.close_session(index);
    }
}

#[test]
fn test_lowest_free_index_is_reused() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.cat_target().unwrap();

    let mut registry = SessionRegistry::new();
    for _ in 0..3 {
        registry.spawn_session(&target, 24, 80).unwrap();
    }

    registry.close_session(2);
    assert_eq!(registry.indices(), vec![1, 3]);

    let index = registry.spawn_session(&target, 24, 80).unwrap();
    assert_eq!(index, 2, "freed index must be reused before higher ones");

    registry.close_session(1);
    assert_eq!(registry.lowest_index(), Some(2));

    for index in registry.indices() {
        registry.close_session(index);
    }
}

#[test]
fn test_close_unknown_index_is_noop() {
    let mut registry = SessionRegistry::new();
    registry.close_session(5);
    registry.release(5);
    assert!(registry.is_empty());

    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.cat_target().unwrap();
    registry.spawn_session(&target, 24, 80).unwrap();

    registry.close_session(9);
    assert_eq!(registry.len(), 1);

    registry.close_session(1);
    // Closing again converges on the same freed state
    registry.close_session(1);
    assert!(registry.is_empty());
}

#[test]
fn test_reap_frees_exited_sessions() {
    let fixtures = TestFixtures::new().unwrap();
    let cat = fixtures.cat_target().unwrap();
    let exits = fixtures.exit_target(0).unwrap();

    let mut registry = SessionRegistry::new();
    registry.spawn_session(&cat, 24, 80).unwrap();
    registry.spawn_session(&exits, 24, 80).unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut freed = Vec::new();
    while Instant::now() < deadline {
        freed = registry.reap_exited();
        if !freed.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(freed, vec![2]);
    assert_eq!(registry.indices(), vec![1]);

    // Nothing else has exited; a second pass is a no-op
    assert!(registry.reap_exited().is_empty());

    registry.close_session(1);
}

#[test]
fn test_release_after_independent_exit() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.exit_target(0).unwrap();

    let mut registry = SessionRegistry::new();
    let index = registry.spawn_session(&target, 24, 80).unwrap();

    // The end-of-stream discovery path: the child is already gone when
    // the slot is freed, so the blocking reap completes at once
    std::thread::sleep(Duration::from_millis(300));
    registry.release(index);
    assert!(registry.is_empty());

    // Freeing the same index again is a no-op
    registry.release(index);
    assert!(registry.is_empty());
}

#[test]
fn test_resize_all_propagates_to_every_session() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures.cat_target().unwrap();

    let mut registry = SessionRegistry::new();
    registry.spawn_session(&target, 24, 80).unwrap();
    registry.spawn_session(&target, 24, 80).unwrap();

    registry.resize_all(30, 100);

    for session in registry.sessions() {
        assert_eq!(session.process().window_size().unwrap(), (30, 100));
    }

    for index in registry.indices() {
        registry.close_session(index);
    }
}

#[test]
fn test_write_reaches_session_child() {
    let fixtures = TestFixtures::new().unwrap();
    let target = fixtures
        .create_test_script("raw-cat", "#!/bin/sh\nstty raw -echo\nexec cat\n")
        .unwrap();

    let mut registry = SessionRegistry::new();
    let index = registry.spawn_session(&target, 24, 80).unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let session = registry.get(index).unwrap();
    session.process().master().write(b"ping\n").unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    while Instant::now() < deadline {
        match session.process().master().read(&mut buf) {
            Ok(PtyRead::Data(n)) => {
                out.extend_from_slice(&buf[..n]);
                if String::from_utf8_lossy(&out).contains("ping") {
                    break;
                }
            }
            Ok(PtyRead::WouldBlock) => std::thread::sleep(Duration::from_millis(10)),
            _ => break,
        }
    }
    assert!(
        String::from_utf8_lossy(&out).contains("ping"),
        "bytes written to the session must come back from the echoing child"
    );

    registry.close_session(index);
}
