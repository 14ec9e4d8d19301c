// concurrency.rs — Concurrent evaluation, runtime injection and async loading.
//
// Readers evaluate while a writer appends rules. Every reader must observe
// whole snapshots: the rule count never goes backwards, and once a tool has
// been seen as allowed it stays allowed.

use std::fs;
use std::sync::Arc;
use std::thread;

use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use gk_policy::{
    update_channel, Decision, LoadOptions, PolicyEngine, PolicyEngineConfig, PolicyError,
    PolicyPaths, PolicyRequest, PolicyUpdate,
};

const TOOLS: usize = 64;

fn tool(i: usize) -> String {
    format!("tool_{}", i)
}

#[test]
fn readers_see_whole_snapshots_while_writer_appends() {
    let engine = Arc::new(PolicyEngine::new(PolicyEngineConfig::default()));

    thread::scope(|scope| {
        for _ in 0..4 {
            let engine = Arc::clone(&engine);
            scope.spawn(move || {
                let mut last_count = 0;
                let mut allowed = vec![false; TOOLS];
                for _ in 0..200 {
                    let count = engine.rule_count();
                    assert!(count >= last_count, "rule count went backwards");
                    last_count = count;

                    for (i, seen) in allowed.iter_mut().enumerate() {
                        let decision = engine.evaluate(&PolicyRequest::new(tool(i))).unwrap();
                        match decision {
                            Decision::Allow => *seen = true,
                            Decision::AskUser => assert!(!*seen, "{} lost its allow", tool(i)),
                            Decision::Deny => panic!("unexpected deny for {}", tool(i)),
                        }
                    }
                }
            });
        }

        let writer = Arc::clone(&engine);
        scope.spawn(move || {
            for i in 0..TOOLS {
                writer.apply_update(&PolicyUpdate::new(tool(i))).unwrap();
            }
        });
    });

    assert_eq!(engine.rule_count(), TOOLS);
    for i in 0..TOOLS {
        assert_eq!(
            engine.evaluate(&PolicyRequest::new(tool(i))).unwrap(),
            Decision::Allow
        );
    }
}

#[test]
fn earlier_decisions_are_unaffected_by_later_injection() {
    let engine = PolicyEngine::default();
    let request = PolicyRequest::new("replace");
    let before = engine.evaluate(&request).unwrap();
    engine.apply_update(&PolicyUpdate::new("replace")).unwrap();
    let after = engine.evaluate(&request).unwrap();

    assert_eq!(before, Decision::AskUser);
    assert_eq!(after, Decision::Allow);
}

#[tokio::test]
async fn async_load_gates_evaluation_until_published() {
    let dir = tempdir().unwrap();
    let admin = dir.path().join("admin");
    fs::create_dir_all(&admin).unwrap();
    fs::write(
        admin.join("deny.toml"),
        "[[rule]]\ntoolName = \"write_file\"\ndecision = \"deny\"\npriority = 1\n",
    )
    .unwrap();

    let engine = Arc::new(PolicyEngine::pending());
    assert!(matches!(
        engine.evaluate(&PolicyRequest::new("write_file")),
        Err(PolicyError::NotReady)
    ));

    let waiter = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine.wait_ready().await;
            engine.evaluate(&PolicyRequest::new("write_file"))
        })
    };

    let options = LoadOptions {
        paths: PolicyPaths {
            admin_dir: Some(admin),
            ..Default::default()
        },
        ..Default::default()
    };
    let report = engine
        .load(options, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.rule_count, 1);
    assert!(report.is_clean());

    assert_eq!(waiter.await.unwrap().unwrap(), Decision::Deny);
}

#[tokio::test]
async fn second_load_is_rejected() {
    let engine = PolicyEngine::pending();
    engine
        .load(LoadOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    let again = engine
        .load(LoadOptions::default(), CancellationToken::new())
        .await;
    assert!(matches!(again, Err(PolicyError::AlreadyLoaded)));
}

#[tokio::test]
async fn updates_sent_during_load_apply_after_publish() {
    let (sender, receiver) = update_channel();
    let engine = Arc::new(PolicyEngine::pending());
    let listener = engine.spawn_update_listener(receiver);

    sender.always_allow("replace");
    engine
        .load(LoadOptions::default(), CancellationToken::new())
        .await
        .unwrap();
    drop(sender);
    listener.await.unwrap();

    assert_eq!(
        engine.evaluate(&PolicyRequest::new("replace")).unwrap(),
        Decision::Allow
    );
}
