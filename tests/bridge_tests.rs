mod mocks;

use mocks::{collaborators, sized_chunks, test_config, MemoryGateway, ScriptedEncoder};
use screen_recorder_lib::bridge::{BridgeReply, BridgeRequest, RecorderService};
use screen_recorder_lib::config::RecorderConfig;
use screen_recorder_lib::storage::{FsGateway, PersistenceGateway};
use std::sync::Arc;
use tempfile::tempdir;

async fn service(chunks: Vec<Vec<u8>>) -> (RecorderService, mocks::Fakes) {
    let (collaborators, fakes) = collaborators(ScriptedEncoder::new(chunks), MemoryGateway::default());
    (RecorderService::new(collaborators, &test_config()).await, fakes)
}

#[tokio::test]
async fn test_start_with_null_source_is_rejected() {
    let (service, fakes) = service(Vec::new()).await;

    let err = service.start_recording(None).await.unwrap_err();

    assert_eq!(err.code, "NO_SOURCE_SELECTED");
    assert!(!service.status().is_recording);
    assert_eq!(service.status().source_id, None);
    assert!(fakes.encoder_log.lock().begun.is_empty());
}

#[tokio::test]
async fn test_start_selects_source_and_echoes_it() {
    let (service, _fakes) = service(sized_chunks(&[12_000, 15_000, 9_000])).await;

    let started = service.start_recording(Some("screen:1".into())).await.unwrap();
    assert_eq!(started.source_id, "screen:1");

    let status = service.status();
    assert!(status.is_recording);
    assert_eq!(status.source_id.as_deref(), Some("screen:1"));

    let stopped = service.stop_recording().await.unwrap();
    assert_eq!(stopped.saved.size, 36_000);
    assert!(!service.status().is_recording);
}

#[tokio::test]
async fn test_double_start_and_stray_stop_codes() {
    let (service, _fakes) = service(Vec::new()).await;

    let err = service.stop_recording().await.unwrap_err();
    assert_eq!(err.code, "NOT_RECORDING");

    service.start_recording(Some("screen:0".into())).await.unwrap();
    let err = service.start_recording(Some("screen:0".into())).await.unwrap_err();
    assert_eq!(err.code, "ALREADY_RECORDING");

    let err = service.start_recording(None).await.unwrap_err();
    assert_eq!(err.code, "ALREADY_RECORDING");
}

#[tokio::test]
async fn test_unknown_source_code() {
    let (service, _fakes) = service(Vec::new()).await;

    let err = service.start_recording(Some("screen:7".into())).await.unwrap_err();

    assert_eq!(err.code, "INVALID_SOURCE");
    assert!(!service.status().is_recording);
}

#[tokio::test]
async fn test_concurrent_starts_admit_one() {
    let (service, fakes) = service(Vec::new()).await;

    let (first, second) = tokio::join!(
        service.start_recording(Some("screen:0".into())),
        service.start_recording(Some("screen:0".into()))
    );

    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    let err = first.err().or(second.err()).unwrap();
    assert_eq!(err.code, "ALREADY_RECORDING");
    assert_eq!(fakes.encoder_log.lock().begun.len(), 1);
}

#[tokio::test]
async fn test_status_push_reaches_subscribers() {
    let (service, _fakes) = service(Vec::new()).await;
    let mut updates = service.subscribe();

    service.start_recording(Some("screen:0".into())).await.unwrap();

    let selected = updates.recv().await.unwrap();
    let started = updates.recv().await.unwrap();
    assert!(!selected.is_recording);
    assert!(started.is_recording);
    assert_eq!(started.message, "Recording started for source: screen:0");
}

#[tokio::test]
async fn test_save_artifact_writes_to_disk() {
    let dir = tempdir().unwrap();
    let (mut collaborators, _fakes) =
        collaborators(ScriptedEncoder::new(Vec::new()), MemoryGateway::default());
    let storage: Arc<dyn PersistenceGateway> =
        Arc::new(FsGateway::new(dir.path().join("Screen Recordings")));
    collaborators.storage = storage;
    let service = RecorderService::new(collaborators, &test_config()).await;

    let saved = service.save_artifact(vec![1u8; 2048]).await.unwrap();

    assert_eq!(saved.size, 2048);
    assert!(mocks::is_recording_filename(&saved.filename, "webm"));
    assert_eq!(std::fs::read(&saved.path).unwrap().len(), 2048);

    let directory = service.output_directory().await.unwrap();
    assert_eq!(directory, saved.directory);
}

#[tokio::test]
async fn test_save_failure_maps_to_write_error() {
    let (collaborators, _fakes) =
        collaborators(ScriptedEncoder::new(Vec::new()), MemoryGateway::failing());
    let service = RecorderService::new(collaborators, &test_config()).await;

    let err = service.save_artifact(vec![0u8; 16]).await.unwrap_err();

    assert_eq!(err.code, "WRITE_ERROR");
}

#[tokio::test]
async fn test_empty_artifact_is_refused() {
    let (service, fakes) = service(Vec::new()).await;

    let err = service.save_artifact(Vec::new()).await.unwrap_err();

    assert_eq!(err.code, "EMPTY_RECORDING");
    assert_eq!(err.message, "No recorded data to save");
    assert!(fakes.storage.files.lock().is_empty());
}

#[tokio::test]
async fn test_microphone_enabled_from_config() {
    let (collaborators, fakes) =
        collaborators(ScriptedEncoder::new(Vec::new()), MemoryGateway::default());
    let config = RecorderConfig {
        microphone: true,
        microphone_id: Some("usb-mic".into()),
        ..test_config()
    };

    let service = RecorderService::new(collaborators, &config).await;

    assert_eq!(fakes.backend.open_microphones(), 1);
    assert!(service.audio_level().await.is_some());
}

#[tokio::test]
async fn test_protocol_round_trip_through_handle() {
    let (service, _fakes) = service(sized_chunks(&[12_000, 15_000, 9_000])).await;

    let request = BridgeRequest::from_bytes(br#"{"op":"start-recording","sourceId":null}"#).unwrap();
    match service.handle(request).await {
        BridgeReply::Error(err) => assert_eq!(err.code, "NO_SOURCE_SELECTED"),
        other => panic!("unexpected reply {:?}", other),
    }

    let request = BridgeRequest::from_bytes(br#"{"op":"start-recording","sourceId":"screen:0"}"#).unwrap();
    assert!(matches!(service.handle(request).await, BridgeReply::Started(s) if s.source_id == "screen:0"));

    match service.handle(BridgeRequest::GetStatus).await {
        BridgeReply::Status(status) => assert!(status.is_recording),
        other => panic!("unexpected reply {:?}", other),
    }

    match service.handle(BridgeRequest::StopRecording).await {
        BridgeReply::Stopped(stopped) => assert_eq!(stopped.saved.size, 36_000),
        other => panic!("unexpected reply {:?}", other),
    }

    let reply = service.handle(BridgeRequest::StopRecording).await;
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["data"]["code"], "NOT_RECORDING");
}

#[tokio::test]
async fn test_quality_presets_listed_in_order() {
    let (service, _fakes) = service(Vec::new()).await;

    match service.handle(BridgeRequest::ListQualityPresets).await {
        BridgeReply::QualityPresets(presets) => {
            let heights: Vec<u32> = presets.iter().map(|p| p.height).collect();
            assert_eq!(heights, vec![720, 1080, 1080, 2160]);
        }
        other => panic!("unexpected reply {:?}", other),
    }
}
