//! Simulator process detection
//!
//! A slow background job scanning the process table for known simulator
//! executables and steering the [`GameSelector`]. An explicit selection
//! (demo source, or a choice made in the configuration shell) wins over
//! detection.

use crate::poller::GameSelector;
use std::time::Duration;
use trackside_core::jobs::LoopJob;
use trackside_core::model::Game;
use tracing::info;

pub const DETECTION_INTERVAL: Duration = Duration::from_secs(1);

/// Whether any of the game's executables is currently running
pub fn is_game_running(game: Game) -> bool {
    game.executables().iter().any(|exe| process::is_running(exe))
}

pub struct GameDetectionJob {
    selector: GameSelector,
}

impl GameDetectionJob {
    pub fn new(selector: GameSelector) -> Self {
        Self { selector }
    }
}

impl LoopJob for GameDetectionJob {
    fn tick(&mut self) {
        match self.selector.selected() {
            // The demo source is an explicit choice, never overridden
            Some(Game::Demo) => {}
            Some(game) => {
                if !is_game_running(game) {
                    info!(game = game.name(), "simulator exited");
                    self.selector.select(None);
                }
            }
            None => {
                if let Some(game) = Game::all().iter().copied().find(|g| is_game_running(*g)) {
                    info!(game = game.name(), "simulator detected");
                    self.selector.select(Some(game));
                }
            }
        }
    }
}

#[cfg(target_os = "windows")]
mod process {
    use std::mem::size_of;
    use windows::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };

    pub fn is_running(target_name: &str) -> bool {
        unsafe {
            let snapshot: HANDLE = match CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) {
                Ok(h) => h,
                Err(_) => return false,
            };
            if snapshot == INVALID_HANDLE_VALUE {
                return false;
            }

            let mut entry = PROCESSENTRY32W {
                dwSize: size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            let mut found = false;
            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    let len = entry
                        .szExeFile
                        .iter()
                        .position(|&c| c == 0)
                        .unwrap_or(entry.szExeFile.len());
                    let name = String::from_utf16_lossy(&entry.szExeFile[..len]);
                    if name.eq_ignore_ascii_case(target_name) {
                        found = true;
                        break;
                    }
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);
            found
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod process {
    /// The simulators are Windows titles; elsewhere nothing is detected
    pub fn is_running(_target_name: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_selection_is_never_overridden() {
        let selector = GameSelector::new();
        selector.select(Some(Game::Demo));

        let mut job = GameDetectionJob::new(selector.clone());
        job.tick();
        job.tick();

        assert_eq!(selector.selected(), Some(Game::Demo));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_absent_simulator_clears_the_selection() {
        let selector = GameSelector::new();
        selector.select(Some(Game::RaceRoom));

        let mut job = GameDetectionJob::new(selector.clone());
        job.tick();

        assert_eq!(selector.selected(), None);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_nothing_detected_without_processes() {
        let selector = GameSelector::new();
        let mut job = GameDetectionJob::new(selector.clone());
        job.tick();
        assert_eq!(selector.selected(), None);
    }
}
