// Window rotation: once at startup, then every `period` on a dedicated thread.
// The cadence free-runs from startup; it does not realign to minute
// boundaries. Verification only ever uses the window_id stamped here.

use crate::error::{SeedError, ServiceError};
use crate::seed::{check_draw, fallback_secret, SeedSource};
use crate::window::{
    window_id_at, AttendanceWindow, Clock, WindowDescriptor, WindowState, WINDOW_SECS,
};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(WINDOW_SECS);

const ROTATOR_THREAD: &str = "window-rotator";

pub struct WindowRotator {
    state: WindowState,
    seed: Arc<dyn SeedSource>,
    clock: Arc<dyn Clock>,
}

impl WindowRotator {
    pub fn new(state: WindowState, seed: Arc<dyn SeedSource>, clock: Arc<dyn Clock>) -> Self {
        Self { state, seed, clock }
    }

    /// Mint a new window and publish it.
    ///
    /// The seed source is consulted before the state lock is taken, so
    /// submissions keep verifying against the previous window until the swap.
    pub fn tick(&self) -> WindowDescriptor {
        let window_id = window_id_at(self.clock.now_secs());
        let draw = match self.seed.obtain_secret().and_then(check_draw) {
            Ok(draw) => draw,
            Err(e) => {
                log_seed_failure(window_id, &e);
                fallback_secret()
            }
        };

        let window = AttendanceWindow::new(window_id, draw.secret, draw.source_id);
        let descriptor = window.descriptor();
        let source_id = window.source_id().to_string();
        let previous = self.state.publish(window);

        info!(
            window_id,
            expires_at = descriptor.expires_at,
            source_id = %source_id,
            previous_window = previous.as_ref().map(|w| w.window_id()),
            previous_accepted = previous.as_ref().map(|w| w.submitted_count()),
            "rotated attendance window"
        );
        descriptor
    }

    /// Tick once now, then every `period` until the handle is stopped.
    pub fn spawn(self, period: Duration) -> Result<RotatorHandle, ServiceError> {
        self.tick();

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(ROTATOR_THREAD.into())
            .spawn(move || self.run(period, stop_rx))
            .map_err(|source| ServiceError::ThreadSpawn {
                thread: ROTATOR_THREAD,
                source,
            })?;

        Ok(RotatorHandle {
            stop_tx,
            handle: Some(handle),
        })
    }

    fn run(self, period: Duration, stop_rx: mpsc::Receiver<()>) {
        loop {
            match stop_rx.recv_timeout(period) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    self.tick();
                }
                // Explicit stop, or every handle dropped.
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("window rotator stopped");
    }
}

fn log_seed_failure(window_id: u64, err: &SeedError) {
    warn!(window_id, error = %err, "seed source failed; using local fallback secret");
}

/// Owns the rotation thread. Dropping the handle also stops it.
pub struct RotatorHandle {
    stop_tx: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RotatorHandle {
    /// Stop the rotation thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("window rotator thread panicked");
            }
        }
    }
}

impl Drop for RotatorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
