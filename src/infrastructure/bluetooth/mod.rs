//! Bluetooth Module
//!
//! BLE communication with fog devices.
//!
//! ## Data flow
//!
//! ```text
//! Controller ──calls──▶ ConnectionManager ──Transport / GattSession──▶ BtleTransport
//!     ▲                        │ accept()                                 │
//!     └──── LinkEvent ◀────────┘◀──────── TransportEvent (mpsc) ◀─────────┘
//! ```
//!
//! The manager never touches the registry; it only knows identities and
//! session ids.
//!
//! ## Modules
//!
//! - [`protocol`] - GATT identifiers and wire encodings
//! - [`transport`] - Transport contract, session events and errors
//! - [`connection`] - Connection Manager
//! - [`scanner`] - BLE device discovery
//! - [`service`] - btleplug-backed transport

pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod transport;

pub use connection::ConnectionManager;
pub use service::BtleTransport;
