// Integration tests for the streaming translation adapter
//
// These tests drive the adapter against the scripted backend: buffering
// under backpressure, reconnect with backoff, graceful close and init
// failures.

mod common;

use anyhow::Result;
use callbridge::error::BridgeError;
use callbridge::translation::{AdapterConfig, LanguagePair, TranslationAdapter, TranslationEvent};
use common::{wait_until, ScriptedBackend};
use std::sync::Arc;
use std::time::Duration;

fn languages() -> LanguagePair {
    LanguagePair::new("es-ES", "en")
}

#[tokio::test]
async fn test_push_audio_keeps_newest_two_seconds() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (adapter, _events) =
        TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await?;

    assert_eq!(adapter.buffer_capacity(), 16000);

    // 5 seconds of 20ms frames pushed without yielding: the worker cannot
    // run on this single-threaded runtime, so the backend looks stalled
    for frame in 0..250i16 {
        adapter.push_audio(&[frame; 160]);
    }

    assert_eq!(adapter.buffered_samples(), 16000);
    assert_eq!(adapter.metrics().dropped_samples, 24000);
    assert_eq!(adapter.metrics().pushed_samples, 40000);

    // Once the worker runs, only the newest 2 seconds reach the backend
    assert!(wait_until(Duration::from_secs(2), || backend.received_len() == 16000).await);
    let received = backend.received_audio();
    assert_eq!(received[0], 150);
    assert_eq!(received[received.len() - 1], 249);

    adapter.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_interruption() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (adapter, _events) =
        TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await?;

    adapter.push_audio(&[1; 160]);
    assert!(wait_until(Duration::from_secs(1), || backend.received_len() == 160).await);

    // First reconnect attempt fails, second succeeds
    backend.fail_next_connects(1);
    backend.interrupt();

    // Audio pushed during the outage is held and delivered after reconnect
    adapter.push_audio(&[2; 160]);

    assert!(wait_until(Duration::from_secs(5), || backend.connect_count() == 3).await);
    assert!(wait_until(Duration::from_secs(1), || backend.received_len() == 320).await);
    assert_eq!(&backend.received_audio()[160..], &[2; 160][..]);

    let metrics = adapter.metrics();
    assert_eq!(metrics.reconnect_attempts, 2);
    assert_eq!(metrics.reconnects, 1);
    assert!(!adapter.is_failed());

    adapter.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_is_retried_after_reconnect() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (adapter, _events) =
        TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await?;

    // The live connection rejects the first chunk
    backend.fail_next_sends(1);
    let speech: Vec<i16> = (0..160).collect();
    adapter.push_audio(&speech);

    assert!(wait_until(Duration::from_secs(5), || backend.received_len() == 160).await);
    assert_eq!(backend.received_audio(), speech);
    assert_eq!(backend.connect_count(), 2);

    let metrics = adapter.metrics();
    assert_eq!(metrics.pushed_samples, 160);
    assert_eq!(metrics.sent_samples, 160);
    assert_eq!(metrics.dropped_samples, 0);
    assert_eq!(metrics.reconnects, 1);

    adapter.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_exhaustion_reports_adapter_error() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (adapter, mut events) =
        TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await?;

    backend.fail_all_connects(true);
    backend.interrupt();

    let event = tokio::time::timeout(Duration::from_secs(30), events.recv()).await?;
    assert!(
        matches!(event, Some(TranslationEvent::AdapterError { .. })),
        "expected adapter error, got {:?}",
        event
    );

    // Initial connect plus 3 reconnect attempts
    assert_eq!(backend.connect_count(), 4);
    assert!(adapter.is_failed());

    // Audio after failure is dropped, not buffered
    adapter.push_audio(&[1; 160]);
    assert_eq!(adapter.buffered_samples(), 0);
    assert_eq!(adapter.metrics().dropped_samples, 160);

    adapter.close().await;
    Ok(())
}

#[test]
fn test_backoff_doubles_up_to_cap() {
    let config = AdapterConfig::default();
    assert_eq!(config.backoff(1), Duration::from_millis(250));
    assert_eq!(config.backoff(2), Duration::from_millis(500));
    assert_eq!(config.backoff(3), Duration::from_millis(1000));
    assert_eq!(config.backoff(6), Duration::from_secs(4));
    assert_eq!(config.backoff(40), Duration::from_secs(4));
}

#[tokio::test]
async fn test_close_delivers_final_results_then_stops() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (adapter, mut events) =
        TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await?;

    backend.emit_on_close(vec![TranslationEvent::Final {
        source_text: "hola".to_string(),
        translated_text: "hello".to_string(),
    }]);

    let consumer = tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(event) = events.recv().await {
            received.push(event);
        }
        received
    });

    adapter.push_audio(&[3; 320]);
    adapter.close().await;
    adapter.close().await;

    assert!(adapter.is_closed());
    assert_eq!(backend.close_count(), 1, "backend closed exactly once");
    assert_eq!(backend.received_len(), 320, "buffered audio flushed on close");

    let received = tokio::time::timeout(Duration::from_secs(1), consumer).await??;
    assert_eq!(
        received,
        vec![TranslationEvent::Final {
            source_text: "hola".to_string(),
            translated_text: "hello".to_string(),
        }]
    );

    // After close, events and audio go nowhere
    assert!(!backend.emit(TranslationEvent::Partial {
        text: "late".to_string()
    }));
    adapter.push_audio(&[1; 160]);
    assert_eq!(adapter.buffered_samples(), 0);

    Ok(())
}

#[tokio::test]
async fn test_abort_discards_pending_events() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (adapter, mut events) =
        TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await?;

    assert!(backend.emit(TranslationEvent::Partial {
        text: "in flight".to_string()
    }));

    // Let the worker forward the event, but do not consume it
    tokio::time::sleep(Duration::from_millis(50)).await;

    adapter.abort().await;
    adapter.close().await;

    assert!(events.recv().await.is_none(), "no event is delivered after close");
    assert_eq!(backend.close_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_open_fails_when_backend_unreachable() {
    let backend = ScriptedBackend::new();
    backend.fail_all_connects(true);

    let result = TranslationAdapter::open(Arc::new(backend.clone()), languages(), AdapterConfig::default()).await;

    assert!(matches!(result, Err(BridgeError::SessionInit(_))));
    assert_eq!(backend.connect_count(), 1, "no retries on initial connect");
}

#[tokio::test(start_paused = true)]
async fn test_open_times_out() {
    let backend = ScriptedBackend::new();
    backend.delay_connects(Duration::from_secs(30));

    let result = TranslationAdapter::open(Arc::new(backend), languages(), AdapterConfig::default()).await;

    assert!(matches!(result, Err(BridgeError::SessionInit(message)) if message.contains("timed out")));
}
