//! funkhaus-signaling – WebSocket-Hub und Signaling
//!
//! Dieser Crate verbindet Browser-Clients ueber WebSockets mit dem
//! Chat-Service und dem Voice-Router.
//!
//! ## Architektur
//!
//! ```text
//! GET /ws?profileId=...   (ws_router)
//!     |
//!     v
//! Verbindung (pro Socket Lese- und Schreib-Pumpe)
//!     |
//!     v
//! Dispatcher
//!     |
//!     +-- ChatHandler   (subscribe, unsubscribe, message)
//!     +-- VoiceHandler  (joined, initializeCall, leave, answer, candidate)
//!
//! Hub
//!     +-- RegisterHandle – Abonnements, Server-Publikum, Send-Queues (ein Task)
//!     +-- SpurRouter     – Medien-Sitzungen und Neuverhandlung
//! ```

pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod server_state;
pub mod ws;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use broadcast::{ClientSender, RegisterHandle, RegisterStatistik, VoiceAbmeldung};
pub use dispatcher::{Dispatcher, VerbindungsKontext};
pub use error::{SignalingError, SignalingResult};
pub use hub::Hub;
pub use server_state::{SignalingConfig, SignalingState};
pub use ws::ws_router;
