//! FIFO ordering of the interactive lock

use std::sync::Arc;
use std::time::{Duration, Instant};

use modular_mcp_gateway::InteractiveLock;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, Copy)]
struct Span {
    ticket: usize,
    entered: Instant,
    left: Instant,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_callers_are_served_in_request_order() {
    let lock = InteractiveLock::new();
    let spans: Arc<Mutex<Vec<Span>>> = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for ticket in 1..=3 {
        let lock = lock.clone();
        let spans = spans.clone();
        handles.push(tokio::spawn(async move {
            let guard = lock.acquire().await;
            let entered = Instant::now();
            tokio::time::sleep(Duration::from_millis(100)).await;
            let left = Instant::now();
            spans.lock().push(Span {
                ticket,
                entered,
                left,
            });
            guard.release();
        }));
        // Make the request order unambiguous
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let spans = spans.lock().clone();
    assert_eq!(spans.iter().map(|s| s.ticket).collect::<Vec<_>>(), vec![1, 2, 3]);
    for pair in spans.windows(2) {
        assert!(pair[1].entered >= pair[0].left, "critical sections overlap: {:?}", pair);
    }
}

#[tokio::test]
async fn test_dropped_guard_unblocks_next_waiter() {
    let lock = InteractiveLock::new();

    {
        let _guard = lock.acquire().await;
    }

    let second = tokio::time::timeout(Duration::from_secs(1), lock.acquire()).await;
    assert!(second.is_ok());
}
