//! funkhaus-chat – Chat-Ereignisse und Kollaborateur-Schnittstellen
//!
//! Dieses Crate implementiert:
//! - `Verzeichnis` / `NachrichtenSpeicher`: synchrone Schnittstellen zur
//!   externen CRUD-Schicht (Profile, Server, Kanaele, Nachrichten)
//! - `InMemoryVerzeichnis`: fluechtige Implementierung beider Traits
//! - `ChatService`: Zulassung, Persistenz und Verteilung von Kanal- und
//!   Direktnachrichten
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use funkhaus_chat::{ChatService, EreignisVerteiler, InMemoryVerzeichnis};
//!
//! fn aufbauen(verteiler: Arc<dyn EreignisVerteiler>) {
//!     let verzeichnis = Arc::new(InMemoryVerzeichnis::neu());
//!     let chat = ChatService::neu(verzeichnis.clone(), verzeichnis, verteiler);
//! }
//! ```

pub mod error;
pub mod service;
pub mod speicher;
pub mod verzeichnis;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use service::{ChatService, EreignisVerteiler};
pub use speicher::InMemoryVerzeichnis;
pub use verzeichnis::{NachrichtenSpeicher, NeueNachricht, Verzeichnis};
