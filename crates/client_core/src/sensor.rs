//! Continuous position feed: the watch capability and a timer-driven
//! simulation of it.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    time::Duration,
};

use shared::{domain::Coordinates, error::SensorError, protocol::SensorReading};
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::IntervalStream, StreamExt};
use tracing::debug;

pub type PositionEvent = Result<SensorReading, SensorError>;
pub type PositionCallback = Box<dyn FnMut(PositionEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// A geolocation-style watch API. The callback fires for every reading
/// until [`clear_watch`](Self::clear_watch) is called with the returned id.
pub trait PositionWatcher {
    fn watch(&self, callback: PositionCallback) -> Result<WatchId, SensorError>;
    fn clear_watch(&self, id: WatchId);
}

/// Emits a reading every `interval`, drifting from `origin` by `step`
/// degrees per reading. Watches run as local tasks, so `watch` must be
/// called inside a `tokio::task::LocalSet`.
pub struct SimulatedPositionWatcher {
    interval: Duration,
    origin: Coordinates,
    step: f64,
    next_id: Cell<u64>,
    watches: RefCell<HashMap<WatchId, JoinHandle<()>>>,
}

impl SimulatedPositionWatcher {
    pub fn new(interval: Duration, origin: Coordinates) -> Self {
        Self {
            interval,
            origin,
            step: 0.0001,
            next_id: Cell::new(1),
            watches: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn active_watches(&self) -> usize {
        self.watches.borrow().len()
    }
}

impl PositionWatcher for SimulatedPositionWatcher {
    fn watch(&self, mut callback: PositionCallback) -> Result<WatchId, SensorError> {
        if self.interval.is_zero() {
            return Err(SensorError::Unavailable(
                "sensor interval must be positive".into(),
            ));
        }

        let id = WatchId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let origin = self.origin;
        let step = self.step;
        let mut ticks = IntervalStream::new(tokio::time::interval(self.interval));
        let task = tokio::task::spawn_local(async move {
            let mut readings = 0u32;
            while ticks.next().await.is_some() {
                let drift = step * f64::from(readings);
                callback(Ok(SensorReading::new(
                    origin.latitude + drift,
                    origin.longitude + drift,
                )));
                readings = readings.saturating_add(1);
            }
        });

        self.watches.borrow_mut().insert(id, task);
        debug!(watch = id.0, interval_ms = self.interval.as_millis() as u64, "position watch started");
        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        if let Some(task) = self.watches.borrow_mut().remove(&id) {
            task.abort();
            debug!(watch = id.0, "position watch cleared");
        }
    }
}

impl Drop for SimulatedPositionWatcher {
    fn drop(&mut self) {
        for (_, task) in self.watches.get_mut().drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/sensor_tests.rs"]
mod tests;
