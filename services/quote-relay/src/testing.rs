//! Test doubles shared by the unit tests

use crate::error::RelayError;
use crate::outbound::Outbound;
use crate::source::QuoteSource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every frame; can be switched into a failing mode.
#[derive(Default)]
pub struct RecordingOutbound {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    failing: AtomicBool,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let outbound = Self::default();
        outbound.failing.store(true, Ordering::SeqCst);
        outbound
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_text(&self, text: String) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::Delivery("connection reset".to_string()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Replays scripted responses, then keeps returning the last one.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch(&self) -> Result<String, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        let response = match next {
            Some(response) => {
                *self.last.lock().unwrap() = Some(response.clone());
                response
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("no scripted response".to_string())),
        };
        response.map_err(RelayError::Transport)
    }
}

/// Upstream body with the legacy decoration.
pub fn rates_body(records: &[(&str, &str, &str)]) -> String {
    let rates: Vec<String> = records
        .iter()
        .map(|(symbol, bid, ask)| {
            format!(r#"{{"Symbol":"{}","Bid":{},"Ask":{}}}"#, symbol, bid, ask)
        })
        .collect();
    format!(r#"null({{"Rates":[{}]}});"#, rates.join(","))
}
