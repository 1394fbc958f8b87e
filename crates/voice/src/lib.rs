//! funkhaus-voice – SFU-Spurverteilung
//!
//! Leitet Medienspuren zwischen den Browsern eines Voice-Kanals weiter,
//! ohne sie zu dekodieren.
//!
//! ## Module
//! - [`peer`] – Traits fuer die native WebRTC-Engine
//! - [`sitzung`] – Medien-Sitzung mit Verhandlungszustand und ICE-Puffer
//! - [`router`] – Voice-Register, Spur-Tabelle und Neuverhandlung
//! - [`webrtc_engine`] – Anbindung an webrtc-rs

pub mod error;
pub mod peer;
pub mod router;
pub mod sitzung;
pub mod webrtc_engine;

#[cfg(test)]
mod tests;

pub use error::{MedienFehler, MedienResult};
pub use peer::{AusgangsSpur, MedienEngine, PeerEreignisse, PeerVerbindung, PeerZustand};
pub use router::{RouterKonfig, RouterStatistik, SignalZustellung, SitzungsBezug, SpurRouter};
pub use sitzung::{MedienSitzung, Teilnehmer, VerhandlungsZustand};
pub use webrtc_engine::WebRtcEngine;
