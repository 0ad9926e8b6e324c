use crate::{MemoryQueue, Message, MqBackend};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_memory_queue_delivers_in_order() {
    let queue = MemoryQueue::new();
    let (tx, mut rx) = mpsc::channel(16);
    queue.subscribe("HttpClient", tx).await.unwrap();

    queue.publish("HttpClient", b"first").await.unwrap();
    queue.publish("HttpClient", b"second").await.unwrap();

    assert_eq!(rx.recv().await.unwrap().payload, b"first");
    assert_eq!(rx.recv().await.unwrap().payload, b"second");
}

#[tokio::test]
async fn test_memory_queue_routes_by_topic() {
    let queue = MemoryQueue::new();
    let (http_tx, mut http_rx) = mpsc::channel(16);
    let (adsl_tx, mut adsl_rx) = mpsc::channel(16);
    queue.subscribe("HttpClient", http_tx).await.unwrap();
    queue.subscribe("ADSL-A", adsl_tx).await.unwrap();

    queue.publish("ADSL-A", b"dial").await.unwrap();
    assert_eq!(adsl_rx.recv().await.unwrap().payload, b"dial");
    assert!(http_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_memory_queue_round_robins_subscribers() {
    let queue = MemoryQueue::new();
    let (tx_a, mut rx_a) = mpsc::channel(16);
    let (tx_b, mut rx_b) = mpsc::channel(16);
    queue.subscribe("HttpClient", tx_a).await.unwrap();
    queue.subscribe("HttpClient", tx_b).await.unwrap();

    for i in 0..4u8 {
        queue.publish("HttpClient", &[i]).await.unwrap();
    }

    let mut a_count = 0;
    let mut b_count = 0;
    while rx_a.try_recv().is_ok() {
        a_count += 1;
    }
    while rx_b.try_recv().is_ok() {
        b_count += 1;
    }
    assert_eq!(a_count, 2);
    assert_eq!(b_count, 2);
}

#[tokio::test]
async fn test_memory_queue_drops_without_subscriber() {
    let queue = MemoryQueue::new();
    queue.publish("HttpClient", b"nobody home").await.unwrap();
}

#[tokio::test]
async fn test_memory_queue_prunes_dead_subscribers() {
    let queue = MemoryQueue::new();
    let (dead_tx, dead_rx) = mpsc::channel(16);
    let (live_tx, mut live_rx) = mpsc::channel(16);
    queue.subscribe("HttpClient", dead_tx).await.unwrap();
    queue.subscribe("HttpClient", live_tx).await.unwrap();
    drop(dead_rx);

    // Both frames must land on the surviving subscriber.
    queue.publish("HttpClient", b"one").await.unwrap();
    queue.publish("HttpClient", b"two").await.unwrap();

    assert_eq!(live_rx.recv().await.unwrap().payload, b"one");
    assert_eq!(live_rx.recv().await.unwrap().payload, b"two");
}

#[tokio::test]
async fn test_message_ack_signals_receiver() {
    let (message, mut ack_rx) = Message::new(b"payload".to_vec());
    message.ack().await.unwrap();
    assert!(ack_rx.recv().await.is_some());
}

#[tokio::test]
async fn test_backend_as_trait_object() {
    let queue: Arc<dyn MqBackend> = Arc::new(MemoryQueue::new());
    let (tx, mut rx) = mpsc::channel(4);
    queue.subscribe("Spider.DEMO", tx).await.unwrap();
    queue.publish("Spider.DEMO", b"{}").await.unwrap();
    assert_eq!(rx.recv().await.unwrap().payload, b"{}");
}
