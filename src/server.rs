//! Measurement daemon
//!
//! The daemon listens on a Unix stream socket. A dedicated thread owns the
//! sensors and measures every `interval`; the accept loop answers clients
//! from the shared snapshot. When a client finds the snapshot older than the
//! interval, the accept loop asks the measurement thread for a fresh cycle
//! and waits for it before answering.

use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use cjmcu_core::sensors::{AirQuality, Barometric, Climate, EnvironmentCompensation, Sensor};
use cjmcu_core::{Snapshot, Station, TimeSource};
use log::{debug, error, info, warn};

use crate::error::AppError;
use crate::hardware::SystemClock;
use crate::protocol::{Command, read_command, write_snapshot};

/// How long a connected client may take to send its command.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Something that produces a fresh snapshot on demand.
pub trait Measure {
    fn measure(&mut self) -> Snapshot;
}

impl<A, H, P, C> Measure for Station<A, H, P, C>
where
    A: Sensor<Reading = AirQuality> + EnvironmentCompensation,
    H: Sensor<Reading = Climate>,
    P: Sensor<Reading = Barometric>,
    C: TimeSource + Clone,
{
    fn measure(&mut self) -> Snapshot {
        *Station::measure(self)
    }
}

/// Requests from the accept loop to the measurement thread.
enum Control {
    /// Measure immediately and send the result back
    MeasureNow(Sender<Snapshot>),
    Shutdown,
}

fn lock(snapshot: &Mutex<Snapshot>) -> MutexGuard<'_, Snapshot> {
    snapshot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish<M: Measure>(station: &mut M, shared: &Mutex<Snapshot>) -> Snapshot {
    let snapshot = station.measure();
    *lock(shared) = snapshot;
    snapshot
}

fn measurement_loop<M: Measure>(
    mut station: M,
    control: Receiver<Control>,
    shared: Arc<Mutex<Snapshot>>,
    interval: Duration,
) {
    let mut deadline = Instant::now() + interval;
    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match control.recv_timeout(timeout) {
            Ok(Control::MeasureNow(reply)) => {
                let snapshot = publish(&mut station, &shared);
                deadline = Instant::now() + interval;
                if reply.send(snapshot).is_err() {
                    debug!("Requester went away before the measurement finished");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                publish(&mut station, &shared);
                deadline = Instant::now() + interval;
            }
            Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Measurement thread stopped");
}

pub struct Server {
    listener: UnixListener,
    path: PathBuf,
    interval: Duration,
}

impl Server {
    /// Bind the socket at `path`, replacing a stale socket file.
    pub fn bind(path: impl Into<PathBuf>, interval: Duration) -> Result<Self, AppError> {
        let path = path.into();
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed stale socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(&path).map_err(|e| {
            error!("Unable to bind {}: {}", path.display(), e);
            AppError::Socket(e)
        })?;

        Ok(Self {
            listener,
            path,
            interval,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take an initial measurement, then serve until a client sends `exit`.
    pub fn run<M: Measure + Send + 'static>(self, mut station: M) -> Result<(), AppError> {
        let shared = Arc::new(Mutex::new(station.measure()));
        let (control, requests) = mpsc::channel();

        let worker = {
            let shared = Arc::clone(&shared);
            let interval = self.interval;
            thread::Builder::new()
                .name("measure".into())
                .spawn(move || measurement_loop(station, requests, shared, interval))?
        };

        info!(
            "Serving on {} (measuring every {} s)",
            self.path.display(),
            self.interval.as_secs()
        );
        let result = self.serve(&control, &shared);

        // The worker also stops once `control` is dropped; this just makes it prompt.
        let _ = control.send(Control::Shutdown);
        if worker.join().is_err() {
            error!("Measurement thread panicked");
        }
        result
    }

    fn serve(&self, control: &Sender<Control>, shared: &Mutex<Snapshot>) -> Result<(), AppError> {
        self.serve_connections(self.listener.incoming(), control, shared)
    }

    fn serve_connections<I>(
        &self,
        connections: I,
        control: &Sender<Control>,
        shared: &Mutex<Snapshot>,
    ) -> Result<(), AppError>
    where
        I: IntoIterator<Item = io::Result<UnixStream>>,
    {
        for stream in connections {
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    // Errors like EMFILE persist until a descriptor frees up.
                    warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };

            match self.handle(&mut stream, control, shared) {
                Ok(Command::Exit) => {
                    info!("Exit requested");
                    return Ok(());
                }
                Ok(Command::Get) => {}
                Err(e) => warn!("Client request failed: {}", e),
            }
        }
        Ok(())
    }

    fn handle(
        &self,
        stream: &mut UnixStream,
        control: &Sender<Control>,
        shared: &Mutex<Snapshot>,
    ) -> Result<Command, AppError> {
        stream.set_read_timeout(Some(CLIENT_TIMEOUT))?;
        let command = read_command(stream)?;
        debug!("Received {:?}", command);

        if command == Command::Get {
            let snapshot = self.current(control, shared);
            write_snapshot(stream, &snapshot)?;
        }
        Ok(command)
    }

    /// The shared snapshot, refreshed first if it is older than the interval.
    fn current(&self, control: &Sender<Control>, shared: &Mutex<Snapshot>) -> Snapshot {
        let cached = *lock(shared);
        let age = cached.age(SystemClock.now());
        if age < self.interval.as_secs() {
            return cached;
        }

        debug!("Snapshot is {} s old, measuring now", age);
        let (reply, fresh) = mpsc::channel();
        if control.send(Control::MeasureNow(reply)).is_err() {
            warn!("Measurement thread is gone, serving cached values");
            return cached;
        }
        fresh.recv().unwrap_or_else(|_| {
            warn!("Measurement thread is gone, serving cached values");
            cached
        })
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            debug!("Unable to remove {}: {}", self.path.display(), e);
        }
    }
}
