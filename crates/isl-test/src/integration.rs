//! End-to-end checks over two participants
//!
//! - Value exchange at the start time
//! - Synchronization timeout bound
//! - Stop request releasing a blocked read

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use isl_core::{Causality, IslError, IslResult, Settings, Value};
use isl_session::{Connector, Hub};

use crate::scenario::participant;

/// Writer and reader of one signal, created and connected in `session`
pub struct Pair {
    pub hub: Arc<Hub>,
    pub writer: Connector,
    pub reader: Connector,
}

impl Pair {
    /// Build, create and connect both participants
    ///
    /// `sync_timeout` applies to the reader's IO, `<= 0` waits forever.
    pub fn connect(session: &str, io: &str, sync_timeout: i32) -> IslResult<Self> {
        let hub = Hub::with_config(Settings::compact());
        let mut writer = participant(&hub, "writer", io, Causality::Output, 10.0, 0.5)?;
        let mut reader = participant(&hub, "reader", io, Causality::Input, 10.0, 0.5)?;
        if let Some(io) = reader.io_mut(io) {
            io.set_sync_timeout(sync_timeout);
        }
        writer.create(Some(session))?;
        reader.create(Some(session))?;
        writer.connect(true)?;
        reader.connect(true)?;
        Ok(Pair { hub, writer, reader })
    }

    pub fn disconnect(mut self) -> IslResult<()> {
        self.reader.disconnect()?;
        self.writer.disconnect()
    }
}

fn io_of<'a>(connector: &'a mut Connector, id: &str) -> IslResult<&'a mut isl_data::Io> {
    connector
        .io_mut(id)
        .ok_or_else(|| IslError::NotFound(id.to_string()))
}

/// Publish 10.5 on "speed" at time 0 and read it back; returns the read value
pub fn run_speed_exchange() -> IslResult<f64> {
    let mut pair = Pair::connect("speed-session", "speed", 5)?;

    let out = io_of(&mut pair.writer, "speed")?;
    out.set_value(Value::real(10.5))?;
    out.set_data(0.0, true)?;

    let input = io_of(&mut pair.reader, "speed")?;
    let time = input.get_data(0.0, true)?;
    let value = input.value().as_real().unwrap_or(f64::NAN);
    tracing::debug!(time, value, "speed exchanged");

    pair.disconnect()?;
    Ok(value)
}

/// Block on a read nobody answers; returns the read outcome and the time it took
pub fn measure_sync_timeout(secs: i32) -> IslResult<(IslResult<f64>, Duration)> {
    let mut pair = Pair::connect("timeout-session", "y", secs)?;
    let input = io_of(&mut pair.reader, "y")?;
    let started = Instant::now();
    let outcome = input.get_last_data(true);
    let elapsed = started.elapsed();
    pair.disconnect()?;
    Ok((outcome, elapsed))
}

/// Block a read on another thread and release it with a stop request
///
/// Returns the blocked read's outcome and whether the request found a listener.
pub fn release_blocked_read_by_stop(delay: Duration) -> IslResult<(IslResult<f64>, bool)> {
    let Pair { hub, mut writer, mut reader } = Pair::connect("stop-session", "y", 0)?;
    reader.start_stop_listener()?;

    let blocked = thread::spawn(move || {
        let outcome = io_of(&mut reader, "y").and_then(|io| io.get_last_data(true));
        (reader, outcome)
    });
    thread::sleep(delay);
    let released = hub.send_stop_request();

    let (mut reader, outcome) = blocked
        .join()
        .map_err(|_| IslError::InvalidState("reader thread panicked".into()))?;
    reader.disconnect()?;
    writer.disconnect()?;
    Ok((outcome, released))
}

#[cfg(test)]
mod tests {
    use super::*;
    use isl_core::SignalType;

    #[test]
    fn test_speed_exchange() {
        assert_eq!(run_speed_exchange().unwrap(), 10.5);
    }

    #[test]
    fn test_sync_timeout_is_bounded() {
        let (outcome, elapsed) = measure_sync_timeout(1).unwrap();
        assert!(matches!(outcome, Err(IslError::SyncTimeout)));
        assert!(elapsed >= Duration::from_millis(950), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
    }

    #[test]
    fn test_stop_request_releases_read() {
        let (outcome, released) = release_blocked_read_by_stop(Duration::from_millis(100)).unwrap();
        assert!(released);
        assert!(matches!(outcome, Err(IslError::Terminated)));
    }

    #[test]
    fn test_disconnect_releases_peer() {
        let mut pair = Pair::connect("peer-session", "y", 0).unwrap();
        let Pair { hub: _, writer, reader } = &mut pair;
        let out = io_of(writer, "y").unwrap();
        out.set_value(Value::real(1.0)).unwrap();
        out.set_data(0.0, true).unwrap();

        // reader leaves: the writer's next full-FIFO wait must not hang
        reader.disconnect().unwrap();
        let out = io_of(writer, "y").unwrap();
        let mut last = Ok(());
        for k in 1..64 {
            last = out.set_data(k as f64 * 0.5, true);
            if last.is_err() {
                break;
            }
        }
        assert!(matches!(last, Err(IslError::Terminated)));
    }

    #[test]
    fn test_store_is_idempotent() {
        let hub = Hub::new();
        let mut c = participant(&hub, "logger", "x", Causality::Output, 1.0, 0.1).unwrap();
        let io = c.io_mut("x").unwrap();
        io.use_store(true);
        io.set_value(Value::real(2.0)).unwrap();
        io.store_data(0.1).unwrap();
        io.set_value(Value::real(3.0)).unwrap();
        assert!(matches!(io.store_data(0.1), Err(IslError::AlreadyStored(_))));
        assert_eq!(io.store().len(), 1);
        assert_eq!(io.store().entries()[0].value, Value::real(2.0));
    }

    #[test]
    fn test_remove_missing_io_keeps_counts() {
        let hub = Hub::new();
        let mut c = participant(&hub, "m", "a", Causality::Output, 1.0, 0.1).unwrap();
        c.new_io("b", Causality::Input, SignalType::Integer, 2).unwrap();
        assert!(matches!(c.remove_io("zzz"), Err(IslError::NotFound(_))));
        assert_eq!(c.nb_ios(), 2);
        assert_eq!(c.nb_inputs() + c.nb_outputs(), c.nb_ios());
    }
}
