//! Screen Recorder - record a screen or window with system audio and microphone.
//!
//! This is the main library crate. The session state machine, stream
//! composition and persistence build without a UI; the `desktop` feature adds
//! the Tauri application on top.

pub mod bridge;
pub mod capture;
pub mod config;
pub mod recorder;
pub mod storage;
pub mod utils;

#[cfg(feature = "desktop")]
pub mod commands;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_recorder=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(feature = "desktop")]
async fn build_service(config: &config::RecorderConfig) -> anyhow::Result<bridge::RecorderService> {
    use anyhow::Context;
    use std::sync::Arc;

    let storage = Arc::new(config.gateway().context("Failed to resolve recordings folder")?);
    let backend = Arc::new(capture::native::NativeBackend::new());
    let encoder = recorder::FfmpegEncoder::probe().await;

    let collaborators = recorder::Collaborators {
        sources: Arc::new(capture::DisplaySourceProvider),
        devices: backend.clone(),
        media: backend,
        encoder: Box::new(encoder),
        storage,
    };

    Ok(bridge::RecorderService::new(collaborators, config).await)
}

/// Forward status pushes to the frontend as `recording-status` events
#[cfg(feature = "desktop")]
fn forward_status(app: tauri::AppHandle, service: &bridge::RecorderService) {
    use tauri::Emitter;
    use tokio::sync::broadcast::error::RecvError;

    let mut updates = service.subscribe();
    tauri::async_runtime::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if let Err(e) = app.emit("recording-status", &update) {
                        tracing::warn!("Failed to emit status: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Status forwarder lagged, skipped {} updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Initialize and run the desktop application
#[cfg(feature = "desktop")]
pub fn run() -> anyhow::Result<()> {
    use commands::recording::RecorderState;
    use tauri::Manager;

    init_tracing();
    tracing::info!("Starting Screen Recorder v{}", env!("CARGO_PKG_VERSION"));

    let config = config::RecorderConfig::load_default().unwrap_or_else(|e| {
        tracing::warn!("Ignoring config: {}", e);
        config::RecorderConfig::default()
    });

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .setup(move |app| {
            let service = tauri::async_runtime::block_on(build_service(&config))?;
            forward_status(app.handle().clone(), &service);
            app.manage(RecorderState { service });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Recording commands
            commands::recording::get_sources,
            commands::recording::select_source,
            commands::recording::start_recording,
            commands::recording::stop_recording,
            commands::recording::get_recording_status,
            commands::recording::get_recording_duration,
            commands::recording::save_recording,
            commands::recording::retry_save,
            commands::recording::discard_unsaved,
            commands::recording::get_quality_presets,
            commands::recording::set_quality,
            commands::recording::set_system_audio,
            commands::recording::set_microphone,
            commands::recording::select_microphone,
            commands::recording::get_audio_devices,
            commands::recording::get_audio_level,
            // System commands
            commands::system::check_screen_permission,
            commands::system::request_screen_permission,
            commands::system::open_recordings_folder,
            commands::system::get_recordings_folder,
        ])
        .build(tauri::generate_context!())?;

    app.run(|handle, event| {
        if let tauri::RunEvent::Exit = event {
            if let Some(state) = handle.try_state::<RecorderState>() {
                tauri::async_runtime::block_on(state.service.shutdown());
            }
        }
    });
    Ok(())
}
