mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{FakeEngine, Monitor};
use docgate_core::{BytesWithMime, CancellationFlag, Gateway};

fn gateway() -> (Arc<Gateway<FakeEngine>>, Monitor) {
    let engine = FakeEngine::new();
    let monitor = engine.monitor();
    (Arc::new(Gateway::new(engine)), monitor)
}

#[tokio::test]
async fn test_extract_file_async() {
    let (gateway, monitor) = gateway();
    let result = gateway
        .extract_file_async("notes.txt", None, &CancellationFlag::new())
        .await
        .unwrap();
    assert_eq!(result.content, "content of notes.txt");
    assert_eq!(monitor.live(), 0);
}

#[tokio::test]
async fn test_cancelled_before_dispatch() {
    let (gateway, monitor) = gateway();
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = gateway
        .extract_bytes_async(b"hi".to_vec(), "text/plain", None, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.message(), "operation cancelled");

    let err = gateway
        .batch_extract_files_async(vec![PathBuf::from("a.txt")], None, &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(monitor.calls(), 0);
}

#[test]
fn test_cancellable_blocking_variants() {
    let (gateway, monitor) = gateway();
    let cancel = CancellationFlag::new();
    assert!(gateway.extract_file_cancellable("a.txt", None, &cancel).is_ok());

    cancel.cancel();
    let err = gateway
        .batch_extract_bytes_cancellable(&[BytesWithMime::new("x", "text/plain")], None, &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(monitor.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_calls_are_serialized() {
    let engine = FakeEngine::new().with_call_delay(Duration::from_micros(200));
    let monitor = engine.monitor();
    let gateway = Arc::new(Gateway::new(engine));
    let cancel = CancellationFlag::new();

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let gateway = Arc::clone(&gateway);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let items = vec![
                    BytesWithMime::new(format!("doc {i}"), "text/plain"),
                    BytesWithMime::new("bad", "fail/x"),
                ];
                gateway.batch_extract_bytes_async(items, None, &cancel).await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let results = task.await.unwrap().unwrap();
        assert_eq!(results[0].as_ref().unwrap().content, format!("doc {i}"));
        assert!(results[1].is_none());
    }
    assert_eq!(monitor.max_in_flight(), 1);
    assert_eq!(monitor.live(), 0);
}
