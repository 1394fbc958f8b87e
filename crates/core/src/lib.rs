//! funkhaus-core – Gemeinsame Typen, Datensaetze und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Funkhaus-Crates gemeinsam genutzt werden.

pub mod error;
pub mod models;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{FunkError, Result};
pub use types::{
    ChannelId, ClientId, ConversationId, KanalSchluessel, MemberId, MessageId, ProfileId,
    ServerId,
};
