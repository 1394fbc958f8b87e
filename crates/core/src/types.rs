//! Gemeinsame Identifikationstypen fuer Funkhaus
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Auf dem Draht
//! erscheinen sie als nackte UUID-Strings.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! id_typ {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Erstellt eine neue zufaellige ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Gibt die innere UUID zurueck
            pub fn inner(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_typ!(
    /// Eindeutige ID einer Socket-Verbindung (lebt nur so lange wie der Socket)
    ClientId
);
id_typ!(
    /// Eindeutige Profil-ID (vom Anmelde-Layer festgelegt)
    ProfileId
);
id_typ!(
    /// Eindeutige Server-ID
    ServerId
);
id_typ!(
    /// Eindeutige Kanal-ID (Text oder Voice)
    ChannelId
);
id_typ!(
    /// Mitgliedschaft eines Profils in einem Server
    MemberId
);
id_typ!(
    /// Eindeutige Konversations-ID (Direktnachrichten)
    ConversationId
);
id_typ!(
    /// Eindeutige Nachrichten-ID
    MessageId
);

// ---------------------------------------------------------------------------
// Kanal-Schluessel
// ---------------------------------------------------------------------------

/// Schluessel eines Chat-Abonnements, z.B. `chat:<id>:messages`
///
/// Clients abonnieren beliebige Schluessel; der Server erzeugt sie fuer
/// neue Nachrichten und Aenderungen ueber [`KanalSchluessel::nachrichten`]
/// bzw. [`KanalSchluessel::aktualisierungen`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KanalSchluessel(String);

impl KanalSchluessel {
    pub fn neu(schluessel: impl Into<String>) -> Self {
        Self(schluessel.into())
    }

    /// Schluessel fuer neu erstellte Nachrichten eines Kanals oder einer Konversation
    pub fn nachrichten(id: impl std::fmt::Display) -> Self {
        Self(format!("chat:{id}:messages"))
    }

    /// Schluessel fuer editierte und geloeschte Nachrichten
    pub fn aktualisierungen(id: impl std::fmt::Display) -> Self {
        Self(format!("chat:{id}:messages:update"))
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }

    pub fn ist_leer(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for KanalSchluessel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KanalSchluessel {
    fn from(s: &str) -> Self {
        Self::neu(s)
    }
}
