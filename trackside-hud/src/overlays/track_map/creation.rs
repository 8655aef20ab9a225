//! Track map creation job
//!
//! A state machine run as a loop job: wait for a lap boundary, trace the
//! player's positions through one clean lap, persist the map and notify
//! the overlay. An existing map on disk short-circuits the trace; a
//! corrupt one is reported through the progress callback and tracking
//! restarts from scratch.

use super::format::{load_map, write_map, MapFormatError, TrackPoint};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use trackside_core::jobs::LoopJob;
use trackside_core::telemetry::SharedTelemetry;
use tracing::{debug, warn};

const ERROR_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreationState {
    Start,
    TraceTrack,
    LoadFromFile,
    NotifySubscriber,
    Error,
    End,
}

/// Human-readable tracking status; `None` clears the message
pub type ProgressCallback = Box<dyn Fn(Option<&str>) + Send + Sync>;
/// Delivers the finished point list
pub type PointsCallback = Box<dyn Fn(Vec<TrackPoint>) + Send + Sync>;

pub struct TrackMapJob {
    telemetry: SharedTelemetry,
    maps_dir: PathBuf,
    on_progress: ProgressCallback,
    on_points: PointsCallback,

    state: CreationState,
    points: Vec<TrackPoint>,
    seen_laps: i32,
    tracked_spline: f32,
    error_since: Option<Instant>,
}

struct PlayerFrame {
    track_name: String,
    laps: i32,
    spline: f32,
    position: [f32; 2],
    lap_invalid: bool,
}

impl TrackMapJob {
    pub fn new(
        telemetry: SharedTelemetry,
        maps_dir: PathBuf,
        on_progress: ProgressCallback,
        on_points: PointsCallback,
    ) -> Self {
        Self {
            telemetry,
            maps_dir,
            on_progress,
            on_points,
            state: CreationState::Start,
            points: Vec::new(),
            seen_laps: i32::MIN,
            tracked_spline: -1.0,
            error_since: None,
        }
    }

    fn map_path(&self, track_name: &str) -> PathBuf {
        self.maps_dir
            .join(format!("{}.bin", track_name.to_lowercase().replace(' ', "_")))
    }

    fn read_player(&self) -> Option<PlayerFrame> {
        if !self.telemetry.has_telemetry() {
            return None;
        }
        self.telemetry.read(|snap| {
            let track_name = snap.session.track.game_name.clone();
            if track_name.is_empty() {
                return None;
            }
            let player = snap.session.cars.get(snap.session.player_car_index);
            Some(PlayerFrame {
                track_name,
                laps: snap.local_car.race.laps_driven,
                spline: player
                    .as_ref()
                    .map(|p| p.track_percent_completed)
                    .unwrap_or(0.0),
                position: snap.local_car.world_position,
                lap_invalid: player
                    .map(|p| p.current_lap.is_invalid)
                    .unwrap_or(false),
            })
        })
    }

    fn start_state(&mut self) -> CreationState {
        let Some(frame) = self.read_player() else {
            return CreationState::Start;
        };

        if self.map_path(&frame.track_name).exists() {
            return CreationState::LoadFromFile;
        }

        (self.on_progress)(Some(
            "Tracking state -> waiting for the lap counter to change.\n\
             For a better mapping drive at constant speed, ideally with\n\
             the pit limiter on, at the center of the track.",
        ));

        if self.seen_laps == i32::MIN {
            self.seen_laps = frame.laps;
            return CreationState::Start;
        }
        if frame.laps != self.seen_laps {
            self.seen_laps = frame.laps;
            return CreationState::TraceTrack;
        }
        CreationState::Start
    }

    fn trace_state(&mut self) -> CreationState {
        let Some(frame) = self.read_player() else {
            return CreationState::TraceTrack;
        };

        (self.on_progress)(Some(&format!(
            "Tracking state -> tracking map ({:.1}%),\n\
             invalidating the lap restarts the trace.",
            self.tracked_spline.max(0.0) * 100.0
        )));

        if (frame.spline - self.tracked_spline).abs() <= f32::EPSILON {
            return CreationState::TraceTrack;
        }
        self.tracked_spline = frame.spline;

        if frame.lap_invalid {
            self.tracked_spline = -1.0;
            self.points.clear();
            self.seen_laps = i32::MIN;
            return CreationState::Start;
        }

        self.points.push(TrackPoint {
            x: frame.position[0],
            y: frame.position[1],
            spline: frame.spline,
        });

        if frame.laps != self.seen_laps {
            // Full lap captured; persist before handing it out
            let path = self.map_path(&frame.track_name);
            (self.on_progress)(Some("Tracking state -> writing map to disk."));
            if let Err(e) = write_map(&path, &self.points) {
                warn!(path = %path.display(), error = %e, "failed to write track map");
                return CreationState::Error;
            }
            return CreationState::NotifySubscriber;
        }

        CreationState::TraceTrack
    }

    fn load_state(&mut self) -> CreationState {
        let Some(frame) = self.read_player() else {
            return CreationState::Start;
        };
        let path = self.map_path(&frame.track_name);
        (self.on_progress)(Some("Tracking state -> map found on disk, loading it."));

        match load_map(&path) {
            Ok(points) => {
                self.points = points;
                CreationState::NotifySubscriber
            }
            Err(MapFormatError::BadMagic) => {
                (self.on_progress)(Some(&format!(
                    "Tracking state -> corrupt map file.\n\
                     Delete it and drive a mapping lap again.\n{}",
                    path.display()
                )));
                CreationState::Error
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "failed to load track map");
                CreationState::Error
            }
        }
    }
}

impl LoopJob for TrackMapJob {
    fn tick(&mut self) {
        self.state = match self.state {
            CreationState::Start => self.start_state(),
            CreationState::TraceTrack => self.trace_state(),
            CreationState::LoadFromFile => self.load_state(),
            CreationState::NotifySubscriber => {
                (self.on_progress)(Some("Map tracked. Enjoy it!"));
                (self.on_points)(self.points.clone());
                CreationState::End
            }
            CreationState::Error => {
                // Back off, then restart tracking from scratch
                let since = *self.error_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= ERROR_RETRY_DELAY {
                    self.error_since = None;
                    self.points.clear();
                    self.tracked_spline = -1.0;
                    self.seen_laps = i32::MIN;
                    CreationState::Start
                } else {
                    CreationState::Error
                }
            }
            CreationState::End => {
                (self.on_progress)(None);
                CreationState::End
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::super::format::encode_map;
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use trackside_core::model::CarInfo;
    use trackside_core::telemetry::{SharedTelemetry, TelemetryWriter};

    fn job_with_dir(
        dir: &TempDir,
    ) -> (
        TrackMapJob,
        TelemetryWriter,
        Arc<Mutex<Option<Vec<TrackPoint>>>>,
        Arc<Mutex<Option<String>>>,
    ) {
        let (writer, reader) = SharedTelemetry::new();
        let delivered = Arc::new(Mutex::new(None));
        let progress = Arc::new(Mutex::new(None));

        let job = TrackMapJob::new(
            reader,
            dir.path().to_path_buf(),
            Box::new({
                let progress = Arc::clone(&progress);
                move |msg| *progress.lock().unwrap() = msg.map(str::to_string)
            }),
            Box::new({
                let delivered = Arc::clone(&delivered);
                move |points| *delivered.lock().unwrap() = Some(points)
            }),
        );
        (job, writer, delivered, progress)
    }

    fn publish_frame(writer: &TelemetryWriter, laps: i32, spline: f32, pos: [f32; 2]) {
        writer.update(|snap| {
            snap.session.track.game_name = "Test Ring".to_string();
            snap.session.player_car_index = 0;
            snap.local_car.race.laps_driven = laps;
            snap.local_car.world_position = pos;
            let mut player = snap.session.cars.get(0).unwrap_or_default();
            player.track_percent_completed = spline;
            snap.session.cars.add_or_update(0, player);
        });
        writer.set_has_telemetry(true);
    }

    #[test]
    fn test_traces_one_lap_and_delivers_points() {
        let dir = TempDir::new().unwrap();
        let (mut job, writer, delivered, _progress) = job_with_dir(&dir);

        // Stay in Start until the lap counter moves
        publish_frame(&writer, 0, 0.0, [0.0, 0.0]);
        job.tick();
        job.tick();
        assert!(delivered.lock().unwrap().is_none());

        // Lap boundary: start tracing
        publish_frame(&writer, 1, 0.0, [0.0, 0.0]);
        job.tick();

        for step in 1..=10 {
            let spline = step as f32 / 10.0;
            publish_frame(&writer, 1, spline % 1.0, [spline * 100.0, spline * 50.0]);
            job.tick();
        }
        // Next lap boundary finishes the trace
        publish_frame(&writer, 2, 0.05, [1.0, 2.0]);
        job.tick();
        job.tick(); // NotifySubscriber

        let points = delivered.lock().unwrap().clone().expect("points delivered");
        assert!(points.len() >= 10);
        assert!(dir.path().join("test_ring.bin").exists());
    }

    #[test]
    fn test_invalidated_lap_restarts_tracking() {
        let dir = TempDir::new().unwrap();
        let (mut job, writer, delivered, _progress) = job_with_dir(&dir);

        publish_frame(&writer, 0, 0.0, [0.0, 0.0]);
        job.tick();
        publish_frame(&writer, 1, 0.1, [1.0, 1.0]);
        job.tick(); // now tracing
        publish_frame(&writer, 1, 0.2, [2.0, 2.0]);
        job.tick();

        // Cut the chicane
        writer.update(|snap| {
            let mut player = snap.session.cars.get(0).unwrap();
            player.current_lap.is_invalid = true;
            player.track_percent_completed = 0.3;
            snap.session.cars.add_or_update(0, player);
        });
        job.tick();

        assert!(delivered.lock().unwrap().is_none());
        assert!(job.points.is_empty());
        assert_eq!(job.state, CreationState::Start);
    }

    #[test]
    fn test_existing_map_is_loaded_instead_of_traced() {
        let dir = TempDir::new().unwrap();
        let existing = vec![TrackPoint {
            x: 1.0,
            y: 2.0,
            spline: 0.5,
        }];
        fs::write(dir.path().join("test_ring.bin"), encode_map(&existing)).unwrap();

        let (mut job, writer, delivered, _progress) = job_with_dir(&dir);
        publish_frame(&writer, 0, 0.0, [0.0, 0.0]);
        job.tick(); // Start -> LoadFromFile
        job.tick(); // LoadFromFile -> NotifySubscriber
        job.tick(); // deliver

        assert_eq!(delivered.lock().unwrap().clone().unwrap(), existing);
    }

    #[test]
    fn test_corrupt_map_reports_and_enters_error_state() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test_ring.bin"), b"XXXXjunkjunkjunk").unwrap();

        let (mut job, writer, delivered, progress) = job_with_dir(&dir);
        publish_frame(&writer, 0, 0.0, [0.0, 0.0]);
        job.tick();
        job.tick();

        assert!(delivered.lock().unwrap().is_none());
        assert_eq!(job.state, CreationState::Error);
        let message = progress.lock().unwrap().clone().unwrap();
        assert!(message.contains("corrupt map file"));

        // The corrupt file stays on disk for the user to inspect
        assert!(dir.path().join("test_ring.bin").exists());
    }

    #[test]
    fn test_progress_callback_sees_waiting_message() {
        let dir = TempDir::new().unwrap();
        let (mut job, writer, _delivered, progress) = job_with_dir(&dir);

        publish_frame(&writer, 0, 0.0, [0.0, 0.0]);
        job.tick();
        job.tick();

        let message = progress.lock().unwrap().clone().unwrap();
        assert!(message.contains("waiting for the lap counter"));
    }
}
