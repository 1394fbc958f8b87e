//! WebRTC-Nutzlasten: Sitzungsbeschreibungen (SDP) und ICE-Kandidaten
//!
//! Eigene Typen statt der Typen einer Media-Engine, damit das Protokoll
//! nicht von einer konkreten WebRTC-Bibliothek abhaengt. Die Feldnamen
//! entsprechen denen von `RTCSessionDescriptionInit` und
//! `RTCIceCandidateInit` im Browser.

use serde::{Deserialize, Serialize};

/// Art einer Sitzungsbeschreibung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeschreibungsTyp {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// SDP-Angebot oder -Antwort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitzungsBeschreibung {
    #[serde(rename = "type")]
    pub typ: BeschreibungsTyp,
    pub sdp: String,
}

impl SitzungsBeschreibung {
    pub fn angebot(sdp: impl Into<String>) -> Self {
        Self {
            typ: BeschreibungsTyp::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn antwort(sdp: impl Into<String>) -> Self {
        Self {
            typ: BeschreibungsTyp::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE-Kandidat in Browser-Form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceKandidat {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceKandidat {
    pub fn neu(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }
}
