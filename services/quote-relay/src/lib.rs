//! Quote Relay Service
//!
//! Polls an upstream quote feed on a fixed cadence, records one mid-price
//! sample per known instrument and pushes each new value to the WebSocket
//! clients subscribed to that instrument.
//!
//! # Architecture
//!
//! ```text
//!  Quote feed (HTTP)
//!        │
//!  ┌─────▼──────┐
//!  │ Ingestion  │  ← fetch → normalize → persist → dispatch, every tick
//!  └──┬──────┬──┘
//!     │      │
//! ┌───▼───┐ ┌▼───────────┐       ┌──────────────┐
//! │ Store │ │ Dispatcher │──────►│   Registry   │
//! └───▲───┘ └────────────┘       └──────▲───────┘
//!     │                                 │
//!     │      ┌──────────────────┐       │
//!     └──────┤ ProtocolHandler  ├───────┘
//!            │ (one per client) │
//!            └──────────────────┘
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod normalizer;
pub mod outbound;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod service;
pub mod session;
pub mod source;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;
