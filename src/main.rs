#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use std::path::PathBuf;

use exo_triage::commands::DesktopState;
use exo_triage::config::AppConfig;
use exo_triage::onnx::OrtBackend;
use log::error;
use log::info;
use log::LevelFilter;
use tauri::Manager;
use tauri_plugin_log::LogTarget;

#[cfg(debug_assertions)]
const LOG_LEVEL: LevelFilter = LevelFilter::Debug;
#[cfg(not(debug_assertions))]
const LOG_LEVEL: LevelFilter = LevelFilter::Warn;


fn main() -> anyhow::Result<()> {
    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().targets([
                LogTarget::LogDir,
                LogTarget::Stdout,
                LogTarget::Webview,
            ])
            .level(LOG_LEVEL)
            .build())
        .setup(|app| {

            // Use e.g. `pnpm tauri dev -- -- --config ./config.json` to pass arguments.
            // Multiple `--` are needed to pass arguments to the binary.
            let config_path = match app.get_cli_matches() {
                Ok(matches) =>
                {
                    matches.args.get("config")
                        .and_then(|arg| arg.value.as_str())
                        .map(PathBuf::from)
                },
                Err(_) =>
                {
                    None
                },
            };

            let config = match config_path {
                Some(path) => AppConfig::load(&path),
                None => Ok(AppConfig::default()),
            };
            let config = match config {
                Ok(config) => config,
                Err(e) => {
                    error!("Error reading configuration: {:?}", e);
                    return Err(e.into());
                }
            };
            info!("Model directory: {:?}", config.model_dir());
            info!("Inference timeout: {:?}", config.inference_timeout());
            info!("ONNX intra-op threads: {}", config.intra_threads());

            // Sessions are created lazily on each mission's first prediction.
            let state: DesktopState = DesktopState::new(OrtBackend::with_intra_threads(config.intra_threads()), &config)?;
            app.manage(state);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            exo_triage::commands::list_missions,
            exo_triage::commands::panel_state,
            exo_triage::commands::update_field,
            exo_triage::commands::run_prediction,
            exo_triage::commands::model_statistics,
            ])
        .run(tauri::generate_context!())?;

    Ok(())
}
