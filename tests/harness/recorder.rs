//! A [`Handler`] that records what it is told.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use wss_engine::{CloseFrame, Error, Handler, UpgradeResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected,
    Disconnected,
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<u16>),
    Error(Error),
}

#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Error(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }

    /// Poll until `wanted` was recorded or `timeout` elapsed.
    pub fn wait_for(&self, wanted: &Event, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count(wanted) > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.count(wanted) > 0
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl Handler for Recorder {
    fn on_connected(&self, _response: Option<&UpgradeResponse>) {
        self.record(Event::Connected);
    }

    fn on_disconnected(&self) {
        self.record(Event::Disconnected);
    }

    fn on_ping(&self, payload: &[u8]) {
        self.record(Event::Ping(payload.to_vec()));
    }

    fn on_pong(&self, payload: &[u8]) {
        self.record(Event::Pong(payload.to_vec()));
    }

    fn on_close(&self, frame: Option<&CloseFrame>) {
        self.record(Event::Close(frame.map(|f| f.code.as_u16())));
    }

    fn on_error(&self, error: &Error) {
        self.record(Event::Error(error.clone()));
    }
}
