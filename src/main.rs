// Prevents additional console window on Windows in release
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    if let Err(e) = screen_recorder_lib::run() {
        eprintln!("error while running screen recorder: {:#}", e);
        std::process::exit(1);
    }
}
