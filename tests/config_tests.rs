// Integration tests for configuration loading

use anyhow::Result;
use callbridge::audio::BargeInPolicy;
use callbridge::config::{BackendKind, Config, FailurePolicy};
use callbridge::session::SessionConfig;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_missing_file_uses_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("absent");

    let config = Config::load(path.to_str().unwrap())?;

    assert_eq!(config.service.http.port, 3000);
    assert_eq!(config.telephony.sample_rate, 8000);
    assert_eq!(config.translation.backend, BackendKind::Echo);
    assert_eq!(config.translation.source_language, "es-ES");
    assert_eq!(config.translation.target_language, "en");
    assert_eq!(config.translation.on_failure, FailurePolicy::Terminate);
    assert_eq!(config.playout.barge_in, BargeInPolicy::Finish);
    Ok(())
}

#[test]
fn test_file_overrides_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("callbridge.toml");
    fs::write(
        &path,
        r#"
[service.http]
port = 8080

[telephony]
forward_to = "+15550001111"

[translation]
source_language = "pt-BR"
buffer_ms = 1000
on_failure = "degrade"

[playout]
barge_in = "flush"
max_queue_ms = 3000
"#,
    )?;

    let config = Config::load(path.to_str().unwrap())?;

    assert_eq!(config.service.http.port, 8080);
    assert_eq!(config.service.http.bind, "0.0.0.0");
    assert_eq!(config.telephony.forward_to.as_deref(), Some("+15550001111"));
    assert_eq!(config.translation.source_language, "pt-BR");
    assert_eq!(config.translation.target_language, "en");
    assert_eq!(config.translation.on_failure, FailurePolicy::Degrade);
    assert_eq!(config.playout.barge_in, BargeInPolicy::Flush);

    let session = SessionConfig::from(&config);
    assert_eq!(session.adapter.buffer, Duration::from_secs(1));
    assert_eq!(session.scheduler.max_queue, Duration::from_secs(3));
    assert_eq!(session.scheduler.frame_samples(), 160);
    assert_eq!(session.default_languages.source, "pt-BR");
    assert_eq!(session.on_failure, FailurePolicy::Degrade);
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("callbridge.toml");
    fs::write(&path, "[translation]\ntarget_language = \"de\"\n")?;

    std::env::set_var("CALLBRIDGE__TRANSLATION__TARGET_LANGUAGE", "fr");
    let config = Config::load(path.to_str().unwrap());
    std::env::remove_var("CALLBRIDGE__TRANSLATION__TARGET_LANGUAGE");

    assert_eq!(config?.translation.target_language, "fr");
    Ok(())
}

#[test]
fn test_invalid_file_is_an_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("callbridge.toml");
    fs::write(&path, "[playout]\nbarge_in = \"sometimes\"\n")?;

    assert!(Config::load(path.to_str().unwrap()).is_err());
    Ok(())
}

#[test]
fn test_unplayable_frame_settings_are_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("callbridge.toml");

    for contents in [
        "[telephony]\nframe_ms = 0\n",
        "[telephony]\nsample_rate = 0\n",
        "[telephony]\nframe_ms = 40\n\n[playout]\nmax_queue_ms = 20\n",
    ] {
        fs::write(&path, contents)?;
        let result = Config::load(path.to_str().unwrap());
        assert!(result.is_err(), "accepted {:?}", contents);
    }

    fs::write(&path, "[telephony]\nframe_ms = 40\n\n[playout]\nmax_queue_ms = 40\n")?;
    let config = Config::load(path.to_str().unwrap())?;
    assert_eq!(SessionConfig::from(&config).scheduler.frame_samples(), 320);
    Ok(())
}
