//! Anbindung an `webrtc` (webrtc-rs)
//!
//! Jede Peer-Verbindung bekommt zwei reine Empfangs-Transceiver (Video,
//! Audio). Eingehende Spuren werden in eine `TrackLocalStaticRTP`
//! gespiegelt, die der Router in alle anderen Verbindungen des Kanals
//! einhaengt. Die RTP-Weiterleitung laeuft in einem eigenen Task bis die
//! eingehende Spur endet.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use funkhaus_protocol::{BeschreibungsTyp, IceKandidat, SitzungsBeschreibung};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

use crate::error::{MedienFehler, MedienResult};
use crate::peer::{AusgangsSpur, MedienEngine, PeerEreignisse, PeerVerbindung, PeerZustand};

// ---------------------------------------------------------------------------
// WebRtcSpur
// ---------------------------------------------------------------------------

/// Geteilte Ausgangsspur einer eingehenden RTP-Spur
pub struct WebRtcSpur {
    id: String,
    stream_id: String,
    lokal: Arc<TrackLocalStaticRTP>,
}

impl AusgangsSpur for WebRtcSpur {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// WebRtcEngine
// ---------------------------------------------------------------------------

pub struct WebRtcEngine {
    api: API,
    ice_server: Vec<String>,
}

impl WebRtcEngine {
    /// Erstellt die Engine mit Standard-Codecs und -Interceptors
    pub fn neu(ice_server: Vec<String>) -> MedienResult<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(MedienFehler::native)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(MedienFehler::native)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, ice_server })
    }

    fn konfiguration(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.ice_server.clone(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

#[async_trait]
impl MedienEngine for WebRtcEngine {
    async fn peer_erstellen(
        &self,
        ereignisse: Arc<dyn PeerEreignisse>,
    ) -> MedienResult<Arc<dyn PeerVerbindung>> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.konfiguration())
                .await
                .map_err(MedienFehler::native)?,
        );

        for art in [RTPCodecType::Video, RTPCodecType::Audio] {
            pc.add_transceiver_from_kind(
                art,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(MedienFehler::native)?;
        }

        callbacks_setzen(&pc, ereignisse);
        Ok(Arc::new(WebRtcPeer { pc }))
    }
}

fn callbacks_setzen(pc: &Arc<RTCPeerConnection>, ereignisse: Arc<dyn PeerEreignisse>) {
    let e = Arc::clone(&ereignisse);
    pc.on_ice_candidate(Box::new(move |kandidat: Option<RTCIceCandidate>| {
        let e = Arc::clone(&e);
        Box::pin(async move {
            let Some(kandidat) = kandidat else { return };
            match kandidat.to_json() {
                Ok(init) => e.ice_kandidat_gefunden(IceKandidat {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_mline_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }),
                Err(err) => tracing::warn!(fehler = %err, "ICE-Kandidat nicht serialisierbar"),
            }
        })
    }));

    let e = Arc::clone(&ereignisse);
    pc.on_peer_connection_state_change(Box::new(move |zustand: RTCPeerConnectionState| {
        e.zustand_geaendert(zustand_umwandeln(zustand));
        Box::pin(async {})
    }));

    let e = ereignisse;
    pc.on_track(Box::new(
        move |entfernt: Arc<TrackRemote>,
              _empfaenger: Arc<RTCRtpReceiver>,
              _transceiver: Arc<RTCRtpTransceiver>| {
            let e = Arc::clone(&e);
            Box::pin(async move {
                let lokal = Arc::new(TrackLocalStaticRTP::new(
                    entfernt.codec().capability,
                    entfernt.id(),
                    entfernt.stream_id(),
                ));
                let spur = Arc::new(WebRtcSpur {
                    id: entfernt.id(),
                    stream_id: entfernt.stream_id(),
                    lokal: Arc::clone(&lokal),
                });
                e.spur_empfangen(Arc::clone(&spur) as Arc<dyn AusgangsSpur>);

                tokio::spawn(async move {
                    while let Ok((paket, _)) = entfernt.read_rtp().await {
                        // Fehler ohne angeschlossene Sender sind erwartbar
                        if let Err(err) = lokal.write_rtp(&paket).await {
                            tracing::trace!(spur = %spur.id, fehler = %err, "RTP nicht weitergeleitet");
                        }
                    }
                    tracing::debug!(spur = %spur.id, "Eingehende Spur beendet");
                    e.spur_beendet(&spur.id);
                });
            })
        },
    ));
}

fn zustand_umwandeln(zustand: RTCPeerConnectionState) -> PeerZustand {
    match zustand {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => PeerZustand::Neu,
        RTCPeerConnectionState::Connecting => PeerZustand::Verbindend,
        RTCPeerConnectionState::Connected => PeerZustand::Verbunden,
        RTCPeerConnectionState::Disconnected => PeerZustand::Getrennt,
        RTCPeerConnectionState::Failed => PeerZustand::Fehlgeschlagen,
        RTCPeerConnectionState::Closed => PeerZustand::Geschlossen,
    }
}

fn nach_nativ(beschreibung: SitzungsBeschreibung) -> MedienResult<RTCSessionDescription> {
    let ergebnis = match beschreibung.typ {
        BeschreibungsTyp::Offer => RTCSessionDescription::offer(beschreibung.sdp),
        BeschreibungsTyp::Answer => RTCSessionDescription::answer(beschreibung.sdp),
        BeschreibungsTyp::Pranswer => RTCSessionDescription::pranswer(beschreibung.sdp),
        BeschreibungsTyp::Rollback => {
            return Err(MedienFehler::Beschreibung(
                "Rollback wird nicht unterstuetzt".into(),
            ))
        }
    };
    ergebnis.map_err(|e| MedienFehler::Beschreibung(e.to_string()))
}

fn aus_nativ(beschreibung: RTCSessionDescription) -> MedienResult<SitzungsBeschreibung> {
    let typ = match beschreibung.sdp_type {
        RTCSdpType::Offer => BeschreibungsTyp::Offer,
        RTCSdpType::Answer => BeschreibungsTyp::Answer,
        RTCSdpType::Pranswer => BeschreibungsTyp::Pranswer,
        RTCSdpType::Rollback => BeschreibungsTyp::Rollback,
        RTCSdpType::Unspecified => {
            return Err(MedienFehler::Beschreibung("SDP-Typ fehlt".into()));
        }
    };
    Ok(SitzungsBeschreibung {
        typ,
        sdp: beschreibung.sdp,
    })
}

// ---------------------------------------------------------------------------
// WebRtcPeer
// ---------------------------------------------------------------------------

struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerVerbindung for WebRtcPeer {
    async fn angebot_erstellen(&self) -> MedienResult<SitzungsBeschreibung> {
        let angebot = self
            .pc
            .create_offer(None)
            .await
            .map_err(MedienFehler::native)?;
        aus_nativ(angebot)
    }

    async fn lokale_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        self.pc
            .set_local_description(nach_nativ(beschreibung)?)
            .await
            .map_err(MedienFehler::native)
    }

    async fn entfernte_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        self.pc
            .set_remote_description(nach_nativ(beschreibung)?)
            .await
            .map_err(MedienFehler::native)
    }

    async fn ice_kandidat_anwenden(&self, kandidat: IceKandidat) -> MedienResult<()> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: kandidat.candidate,
                sdp_mid: kandidat.sdp_mid,
                sdp_mline_index: kandidat.sdp_mline_index,
                username_fragment: kandidat.username_fragment,
            })
            .await
            .map_err(MedienFehler::native)
    }

    async fn spur_hinzufuegen(&self, spur: Arc<dyn AusgangsSpur>) -> MedienResult<()> {
        let webrtc_spur = spur
            .as_any()
            .downcast_ref::<WebRtcSpur>()
            .ok_or_else(|| MedienFehler::Native(format!("Spur {} gehoert nicht zu webrtc", spur.id())))?;

        let sender = self
            .pc
            .add_track(Arc::clone(&webrtc_spur.lokal) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(MedienFehler::native)?;

        // RTCP des Senders lesen, damit die Interceptors arbeiten
        tokio::spawn(async move {
            let mut puffer = vec![0u8; 1500];
            while sender.read(&mut puffer).await.is_ok() {}
        });
        Ok(())
    }

    async fn spur_entfernen(&self, spur_id: &str) -> MedienResult<()> {
        for sender in self.pc.get_senders().await {
            let passt = match sender.track().await {
                Some(t) => t.id() == spur_id,
                None => false,
            };
            if passt {
                self.pc
                    .remove_track(&sender)
                    .await
                    .map_err(MedienFehler::native)?;
            }
        }
        Ok(())
    }

    async fn gesendete_spur_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for sender in self.pc.get_senders().await {
            if let Some(t) = sender.track().await {
                ids.push(t.id().to_string());
            }
        }
        ids
    }

    async fn keyframe_anfordern(&self) -> MedienResult<()> {
        let mut pakete: Vec<Box<dyn webrtc::rtcp::packet::Packet + Send + Sync>> = Vec::new();
        for empfaenger in self.pc.get_receivers().await {
            for spur in empfaenger.tracks().await {
                let ssrc = spur.ssrc();
                if ssrc != 0 {
                    pakete.push(Box::new(PictureLossIndication {
                        sender_ssrc: 0,
                        media_ssrc: ssrc,
                    }));
                }
            }
        }
        if pakete.is_empty() {
            return Ok(());
        }
        self.pc
            .write_rtcp(&pakete)
            .await
            .map(|_| ())
            .map_err(MedienFehler::native)
    }

    fn zustand(&self) -> PeerZustand {
        zustand_umwandeln(self.pc.connection_state())
    }

    async fn schliessen(&self) -> MedienResult<()> {
        self.pc.close().await.map_err(MedienFehler::native)
    }
}
