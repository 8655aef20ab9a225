//! Shared telemetry snapshot
//!
//! One process-wide snapshot of the normalized session/car state, built
//! once and owned jointly by the poll loop (sole writer) and any number of
//! overlay readers. The writer half is a distinct type handed out exactly
//! once, so single-writer discipline holds by construction instead of by
//! convention.

use crate::model::{EntryList, GameData, LocalCarData, SessionData};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Complete normalized telemetry state
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub local_car: LocalCarData,
    pub session: SessionData,
    pub game: GameData,
    pub updated_at: DateTime<Utc>,
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            local_car: LocalCarData::default(),
            session: SessionData::default(),
            game: GameData::default(),
            updated_at: Utc::now(),
        }
    }
}

struct Shared {
    snapshot: RwLock<TelemetrySnapshot>,
    has_telemetry: AtomicBool,
}

/// Read handle to the live snapshot, cheap to clone and share
#[derive(Clone)]
pub struct SharedTelemetry {
    shared: Arc<Shared>,
}

/// Write handle, owned exclusively by the telemetry poll loop
pub struct TelemetryWriter {
    shared: Arc<Shared>,
}

impl SharedTelemetry {
    /// Build the snapshot and split it into its writer and reader halves
    pub fn new() -> (TelemetryWriter, SharedTelemetry) {
        let shared = Arc::new(Shared {
            snapshot: RwLock::new(TelemetrySnapshot::default()),
            has_telemetry: AtomicBool::new(false),
        });
        (
            TelemetryWriter {
                shared: Arc::clone(&shared),
            },
            SharedTelemetry { shared },
        )
    }

    /// Owned copy of the local car section
    pub fn local_car(&self) -> LocalCarData {
        self.read(|snap| snap.local_car.clone())
    }

    /// Owned copy of the session section. The contained [`EntryList`]
    /// shares its car map with the live snapshot; use
    /// [`EntryList::snapshot`] for an iteration copy.
    pub fn session(&self) -> SessionData {
        self.read(|snap| snap.session.clone())
    }

    pub fn game(&self) -> GameData {
        self.read(|snap| snap.game.clone())
    }

    /// Consistent multi-section read under one lock
    pub fn read<R>(&self, f: impl FnOnce(&TelemetrySnapshot) -> R) -> R {
        let guard = self
            .shared
            .snapshot
            .read()
            .expect("telemetry snapshot lock poisoned");
        f(&guard)
    }

    /// Whether the active adapter currently delivers live data
    pub fn has_telemetry(&self) -> bool {
        self.shared.has_telemetry.load(Ordering::Acquire)
    }
}

impl TelemetryWriter {
    /// Mutate leaf values in place under the write lock
    pub fn update<R>(&self, f: impl FnOnce(&mut TelemetrySnapshot) -> R) -> R {
        let mut guard = self
            .shared
            .snapshot
            .write()
            .expect("telemetry snapshot lock poisoned");
        let result = f(&mut guard);
        guard.updated_at = Utc::now();
        result
    }

    /// Replace all three sections at once.
    ///
    /// Runs under a single write lock so no reader can observe a mix of
    /// old- and new-simulator data. Called on simulator switch and stop.
    pub fn clear(&self) {
        let mut guard = self
            .shared
            .snapshot
            .write()
            .expect("telemetry snapshot lock poisoned");
        guard.local_car = LocalCarData::default();
        guard.session = SessionData {
            cars: EntryList::new(),
            ..SessionData::default()
        };
        guard.game = GameData::default();
        guard.updated_at = Utc::now();
        self.shared.has_telemetry.store(false, Ordering::Release);
    }

    pub fn set_has_telemetry(&self, value: bool) {
        self.shared.has_telemetry.store(value, Ordering::Release);
    }

    /// A reader handle for the same snapshot
    pub fn reader(&self) -> SharedTelemetry {
        SharedTelemetry {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CarInfo, Game, RaceSessionType};
    use std::thread;

    #[test]
    fn test_single_section_reads_are_clones() {
        let (writer, reader) = SharedTelemetry::new();
        writer.update(|snap| snap.local_car.race.laps_driven = 7);

        let car = reader.local_car();
        writer.update(|snap| snap.local_car.race.laps_driven = 8);

        assert_eq!(car.race.laps_driven, 7);
        assert_eq!(reader.local_car().race.laps_driven, 8);
    }

    #[test]
    fn test_clear_replaces_all_sections_atomically() {
        let (writer, reader) = SharedTelemetry::new();
        writer.update(|snap| {
            snap.game.game = Some(Game::RaceRoom);
            snap.session.session_type = RaceSessionType::Race;
            snap.session.cars.add_or_update(0, CarInfo::default());
            snap.local_car.race.laps_driven = 3;
        });
        writer.set_has_telemetry(true);

        writer.clear();

        reader.read(|snap| {
            assert!(snap.game.game.is_none());
            assert_eq!(snap.session.session_type, RaceSessionType::Unknown);
            assert!(snap.session.cars.is_empty());
            assert_eq!(snap.local_car.race.laps_driven, 0);
        });
        assert!(!reader.has_telemetry());
    }

    #[test]
    fn test_no_reader_observes_mixed_generations() {
        // The writer flips between two self-consistent states; every read
        // must see one generation or the other, never a blend.
        let (writer, reader) = SharedTelemetry::new();

        let writer_thread = thread::spawn(move || {
            for i in 0..500 {
                if i % 2 == 0 {
                    writer.update(|snap| {
                        snap.game.game = Some(Game::IRacing);
                        snap.local_car.race.laps_driven = 100;
                    });
                } else {
                    writer.clear();
                }
            }
        });

        for _ in 0..500 {
            reader.read(|snap| match snap.game.game {
                Some(Game::IRacing) => {
                    assert_eq!(snap.local_car.race.laps_driven, 100)
                }
                None => assert_eq!(snap.local_car.race.laps_driven, 0),
                other => panic!("unexpected game {other:?}"),
            });
        }

        writer_thread.join().unwrap();
    }
}
