//! Telemetry poll loop
//!
//! A [`LoopJob`] that owns the active simulator adapter as an explicit
//! state machine: `Idle` or `Active { game, adapter }`. Switching the
//! selected simulator stops the old adapter, clears the snapshot under
//! one write lock and lets the next tick construct the new adapter, so
//! there is never a window with two adapters writing.
//!
//! After every update the poller diffs the snapshot against the previous
//! tick and publishes derived change events (session type/phase/status,
//! lap completions).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trackside_core::adapter::SimulatorAdapter;
use trackside_core::events::{TelemetryEvent, TelemetryEvents};
use trackside_core::jobs::LoopJob;
use trackside_core::model::{Game, RaceSessionType, SessionPhase, SimStatus};
use trackside_core::telemetry::TelemetryWriter;
use tracing::{debug, info};

/// Default polling cadence (20 Hz)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared handle naming the simulator the poller should read.
///
/// Set by game detection or by the configuration shell; the poller only
/// ever reads it.
#[derive(Clone, Default)]
pub struct GameSelector {
    selected: Arc<Mutex<Option<Game>>>,
}

impl GameSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&self, game: Option<Game>) {
        *self.selected.lock().expect("game selector poisoned") = game;
    }

    pub fn selected(&self) -> Option<Game> {
        *self.selected.lock().expect("game selector poisoned")
    }
}

enum AdapterState {
    Idle,
    Active {
        game: Game,
        adapter: Box<dyn SimulatorAdapter>,
    },
}

#[derive(Default)]
struct PrevState {
    session_type: RaceSessionType,
    phase: SessionPhase,
    status: SimStatus,
    car_laps: HashMap<i32, i32>,
}

pub struct TelemetryPoller {
    writer: TelemetryWriter,
    events: TelemetryEvents,
    selector: GameSelector,
    state: AdapterState,
    prev: PrevState,
    unsupported_logged: Option<Game>,
}

impl TelemetryPoller {
    pub fn new(writer: TelemetryWriter, events: TelemetryEvents, selector: GameSelector) -> Self {
        Self {
            writer,
            events,
            selector,
            state: AdapterState::Idle,
            prev: PrevState::default(),
            unsupported_logged: None,
        }
    }

    /// Stop the active adapter and wipe the snapshot. The transition the
    /// whole swap invariant hangs on; runs on selection change and at
    /// poller teardown.
    fn teardown_active(&mut self) {
        if let AdapterState::Active { game, mut adapter } =
            std::mem::replace(&mut self.state, AdapterState::Idle)
        {
            info!(game = game.name(), "stopping simulator adapter");
            adapter.stop();
        }
        self.writer.clear();
        self.prev = PrevState::default();
        self.events.emit(&TelemetryEvent::SessionRestarted);
    }

    fn diff_and_emit(&mut self) {
        let reader = self.writer.reader();
        let (session_type, phase, status, laps) = reader.read(|snap| {
            let laps: Vec<_> = snap
                .session
                .cars
                .snapshot()
                .into_iter()
                .map(|(idx, car)| (idx, car.lap_index, car.last_lap.clone()))
                .collect();
            (
                snap.session.session_type,
                snap.session.phase,
                snap.game.status,
                laps,
            )
        });

        if session_type != self.prev.session_type {
            self.prev.session_type = session_type;
            self.events
                .emit(&TelemetryEvent::SessionTypeChanged(session_type));
        }
        if phase != self.prev.phase {
            self.prev.phase = phase;
            self.events.emit(&TelemetryEvent::SessionPhaseChanged(phase));
        }
        if status != self.prev.status {
            self.prev.status = status;
            self.events.emit(&TelemetryEvent::StatusChanged(status));
        }

        for (car_index, lap_index, last_lap) in laps {
            let prev_laps = self.prev.car_laps.insert(car_index, lap_index);
            // A lap completed when the counter advances past a known
            // value and the simulator delivered a time for it
            if let Some(prev) = prev_laps {
                if lap_index > prev && last_lap.laptime_ms.is_some() {
                    self.events.emit(&TelemetryEvent::LapCompleted {
                        car_index,
                        lap: last_lap,
                    });
                }
            }
        }
    }
}

impl LoopJob for TelemetryPoller {
    fn before_run(&mut self) {
        info!("telemetry poller started");
    }

    fn tick(&mut self) {
        let selected = self.selector.selected();

        // Selection changed away from the active adapter: tear down now,
        // construct the replacement on the next tick.
        let active_game = match &self.state {
            AdapterState::Active { game, .. } => Some(*game),
            AdapterState::Idle => None,
        };
        if let Some(game) = active_game {
            if selected != Some(game) {
                self.teardown_active();
                return;
            }
        }

        if let AdapterState::Idle = self.state {
            let Some(game) = selected else {
                return;
            };
            match trackside_adapters::create_adapter(game) {
                Some(adapter) => {
                    info!(game = game.name(), "simulator adapter created");
                    self.unsupported_logged = None;
                    self.state = AdapterState::Active { game, adapter };
                }
                None => {
                    if self.unsupported_logged != Some(game) {
                        debug!(game = game.name(), "no common-path adapter for game");
                        self.unsupported_logged = Some(game);
                    }
                    return;
                }
            }
        }

        if let AdapterState::Active { adapter, .. } = &mut self.state {
            self.writer.update(|snap| {
                adapter.update(&mut snap.local_car, &mut snap.session, &mut snap.game)
            });
            self.writer.set_has_telemetry(adapter.has_telemetry());
            self.diff_and_emit();
        }
    }

    fn after_cancel(&mut self) {
        self.teardown_active();
        info!("telemetry poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trackside_core::telemetry::SharedTelemetry;

    fn poller() -> (TelemetryPoller, GameSelector, TelemetryEvents, SharedTelemetry) {
        let (writer, reader) = SharedTelemetry::new();
        let events = TelemetryEvents::new();
        let selector = GameSelector::new();
        let poller = TelemetryPoller::new(writer, events.clone(), selector.clone());
        (poller, selector, events, reader)
    }

    #[test]
    fn test_idle_until_a_game_is_selected() {
        let (mut poller, _selector, _events, reader) = poller();
        poller.tick();
        assert!(reader.game().game.is_none());
        assert!(!reader.has_telemetry());
    }

    #[test]
    fn test_demo_selection_populates_snapshot() {
        let (mut poller, selector, _events, reader) = poller();
        selector.select(Some(Game::Demo));

        poller.tick();

        assert_eq!(reader.game().game, Some(Game::Demo));
        assert!(reader.has_telemetry());
        assert!(!reader.session().cars.is_empty());
    }

    #[test]
    fn test_switching_games_clears_the_snapshot_first() {
        let (mut poller, selector, _events, reader) = poller();
        selector.select(Some(Game::Demo));
        poller.tick();
        assert!(reader.has_telemetry());

        // RaceRoom has no source in this environment; after the swap the
        // demo data must be gone and no telemetry reported.
        selector.select(Some(Game::RaceRoom));
        poller.tick(); // teardown tick
        assert!(!reader.has_telemetry());
        assert!(reader.session().cars.is_empty());
        assert!(reader.game().game.is_none());

        poller.tick(); // adapter construction tick
        assert!(!reader.has_telemetry());
    }

    #[test]
    fn test_session_restart_event_fires_on_swap() {
        let (mut poller, selector, events, _reader) = poller();
        let restarts = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let restarts = Arc::clone(&restarts);
            events.subscribe(move |event| {
                if matches!(event, TelemetryEvent::SessionRestarted) {
                    restarts.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        selector.select(Some(Game::Demo));
        poller.tick();
        selector.select(None);
        poller.tick();

        assert_eq!(restarts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_type_change_event_fires_once() {
        let (mut poller, selector, events, _reader) = poller();
        let changes = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let changes = Arc::clone(&changes);
            events.subscribe(move |event| {
                if matches!(event, TelemetryEvent::SessionTypeChanged(_)) {
                    changes.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        selector.select(Some(Game::Demo));
        poller.tick(); // Unknown -> Race
        poller.tick(); // still Race, no event
        poller.tick();

        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_acc_selection_stays_idle_without_spamming() {
        let (mut poller, selector, _events, reader) = poller();
        selector.select(Some(Game::AssettoCorsaCompetizione));
        poller.tick();
        poller.tick();
        assert!(!reader.has_telemetry());
    }
}
