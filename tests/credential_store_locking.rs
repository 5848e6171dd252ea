use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use oauth2l_lib::{Credential, CredentialFingerprint, CredentialStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_transaction_waits_for_first_and_sees_its_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("oauth2l.token");
    let fingerprint = CredentialFingerprint::new("client", &["openid"]);

    let first = CredentialStore::new(&path);
    let tx = first.begin().await.expect("first lock");
    assert!(tx.get(&fingerprint).is_none());

    let second_done = Arc::new(AtomicBool::new(false));
    let waiter = {
        let path = path.clone();
        let fingerprint = fingerprint.clone();
        let second_done = Arc::clone(&second_done);
        tokio::spawn(async move {
            let second = CredentialStore::new(&path);
            let tx = second.begin().await.expect("second lock");
            second_done.store(true, Ordering::SeqCst);
            tx.get(&fingerprint)
        })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!second_done.load(Ordering::SeqCst), "lock was not exclusive");

    tx.put(&fingerprint, &Credential::access_token_only("ya29.first", None))
        .expect("put");
    drop(tx);

    let seen = tokio::time::timeout(Duration::from_secs(10), waiter)
        .await
        .expect("second transaction finished")
        .expect("join");
    assert_eq!(
        seen.and_then(|c| c.bearer_token().map(str::to_string)),
        Some("ya29.first".to_string())
    );
}

#[tokio::test]
async fn entries_for_different_fingerprints_coexist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("oauth2l.token"));
    let a = CredentialFingerprint::new("client", &["openid"]);
    let b = CredentialFingerprint::new("client", &["email"]);

    store
        .put(&a, &Credential::access_token_only("ya29.a", None))
        .await
        .expect("put a");
    store
        .put(&b, &Credential::access_token_only("ya29.b", None))
        .await
        .expect("put b");

    let got_a = store.get(&a).await.expect("get a").expect("entry a");
    let got_b = store.get(&b).await.expect("get b").expect("entry b");
    assert_eq!(got_a.bearer_token(), Some("ya29.a"));
    assert_eq!(got_b.bearer_token(), Some("ya29.b"));

    assert!(store.reset().await.expect("reset"));
    assert!(store.get(&a).await.expect("get after reset").is_none());
    assert!(!store.reset().await.expect("second reset"));
}
