// Integration tests for the built-in echo translation backend

use anyhow::Result;
use callbridge::translation::{EchoBackend, EchoConfig, LanguagePair, TranslationBackend, TranslationEvent};

fn speech(ms: usize) -> Vec<i16> {
    (0..ms * 8).map(|i| if i % 2 == 0 { 2000 } else { -2000 }).collect()
}

fn silence(ms: usize) -> Vec<i16> {
    vec![0; ms * 8]
}

#[tokio::test]
async fn test_echo_segments_utterances_on_pause() -> Result<()> {
    let backend = EchoBackend::new(EchoConfig::default());
    let mut session = backend.connect(&LanguagePair::new("es-ES", "en")).await?;

    session.sink.send_audio(&silence(100)).await?;
    session.sink.send_audio(&speech(400)).await?;
    session.sink.send_audio(&silence(800)).await?;

    let partial = session.events.recv().await.transpose()?;
    assert_eq!(
        partial,
        Some(TranslationEvent::Partial {
            text: "utterance 1".to_string()
        })
    );

    let final_event = session.events.recv().await.transpose()?;
    assert_eq!(
        final_event,
        Some(TranslationEvent::Final {
            source_text: "utterance 1".to_string(),
            translated_text: "utterance 1".to_string(),
        })
    );

    match session.events.recv().await.transpose()? {
        Some(TranslationEvent::SynthesizedAudio { samples, sample_rate }) => {
            assert_eq!(sample_rate, 8000);
            assert_eq!(samples, speech(400), "trailing silence is trimmed");
        }
        other => panic!("expected synthesized audio, got {:?}", other),
    }

    assert!(session.events.try_recv().is_err(), "nothing else pending");
    Ok(())
}

#[tokio::test]
async fn test_echo_close_finishes_open_utterance() -> Result<()> {
    let backend = EchoBackend::new(EchoConfig::default());
    let mut session = backend.connect(&LanguagePair::new("es-ES", "en")).await?;

    session.sink.send_audio(&speech(200)).await?;
    session.sink.close().await?;

    let mut kinds = Vec::new();
    while let Some(event) = session.events.recv().await {
        kinds.push(event?.kind());
    }

    assert_eq!(kinds, vec!["partial", "final", "synthesized_audio"]);

    // Closed sessions refuse more audio
    assert!(session.sink.send_audio(&speech(20)).await.is_err());
    Ok(())
}
