//! Tests fuer Dispatcher, Handler und Hub im Zusammenspiel

use funkhaus_chat::ChatError;
use funkhaus_core::models::KanalTyp;
use funkhaus_core::{ChannelId, KanalSchluessel, ServerId};
use funkhaus_protocol::{
    Inhalt, IceKandidat, NachrichtenTyp, SitzungsBeschreibung, TeilnehmerEreignis, Umschlag,
    WebRtcInhalt,
};
use funkhaus_voice::MedienFehler;

use super::{aufbau, aufbau_mit, bis, warten_auf};
use crate::dispatcher::Dispatcher;
use crate::error::SignalingError;
use crate::server_state::SignalingConfig;

fn subscribe(schluessel: &KanalSchluessel) -> String {
    format!(r#"{{"type":"subscribe","channel":"{schluessel}"}}"#)
}

fn anruf(a: &super::Aufbau, stream_id: &str) -> Umschlag {
    Umschlag::neu(
        NachrichtenTyp::InitializeCall,
        Inhalt::WebRtc(WebRtcInhalt {
            stream_id: Some(stream_id.to_string()),
            ..Default::default()
        }),
    )
    .mit_channel(a.voicekanal.to_string())
    .mit_server(a.server)
}

#[tokio::test]
async fn chat_nachricht_erreicht_alle_abonnenten() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let gast = a.gast("Bert");
    let (mut ctx_a, mut rx_a) = a.verbinden(&a.besitzer);
    let (mut ctx_b, mut rx_b) = a.verbinden(&gast);

    let schluessel = KanalSchluessel::nachrichten(a.textkanal);
    dispatcher.verarbeiten(&subscribe(&schluessel), &mut ctx_a).await;
    dispatcher.verarbeiten(&subscribe(&schluessel), &mut ctx_b).await;

    a.state
        .chat_service
        .nachricht_erstellen(a.besitzer.id, a.server, a.textkanal, "Hallo zusammen", None)
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let u = warten_auf(rx, NachrichtenTyp::Message).await;
        assert_eq!(u.channel.as_deref(), Some(schluessel.als_str()));
        match u.inhalt {
            Inhalt::Chat(c) => assert_eq!(c.content.as_deref(), Some("Hallo zusammen")),
            andere => panic!("Falsche Variante: {andere:?}"),
        }
    }
}

#[tokio::test]
async fn message_ohne_abonnenten_ist_noop() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    dispatcher
        .verarbeiten(
            r#"{"type":"message","channel":"chat:niemand:messages","content":{"content":"hallo"}}"#,
            &mut ctx,
        )
        .await;

    assert!(a.state.hub.ist_registriert(ctx.client_id).await);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unbekannter_typ_wird_ignoriert() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    dispatcher.verarbeiten(r#"{"type":"tanzen"}"#, &mut ctx).await;
    dispatcher.verarbeiten("kein json", &mut ctx).await;

    assert!(a.state.hub.ist_registriert(ctx.client_id).await);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn server_typen_vom_client_werden_abgelehnt() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    for typ in [
        NachrichtenTyp::Offer,
        NachrichtenTyp::Participant,
        NachrichtenTyp::Participants,
    ] {
        let e = dispatcher
            .dispatch(Umschlag::neu(typ, Inhalt::Keine), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(e, SignalingError::NurVomServer(t) if t == typ.als_str()));
    }
}

#[tokio::test]
async fn subscribe_ohne_channel_ist_fehler() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    let e = dispatcher
        .dispatch(Umschlag::neu(NachrichtenTyp::Subscribe, Inhalt::Keine), &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(e, SignalingError::FehlendesFeld("channel")));
}

#[tokio::test]
async fn unsubscribe_beendet_abonnement() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);
    let schluessel = KanalSchluessel::nachrichten(a.textkanal);

    dispatcher.verarbeiten(&subscribe(&schluessel), &mut ctx).await;
    assert_eq!(a.state.hub.abonnenten(schluessel.clone()).await, vec![ctx.client_id]);

    dispatcher
        .verarbeiten(
            &format!(r#"{{"type":"unsubscribe","channel":"{schluessel}"}}"#),
            &mut ctx,
        )
        .await;
    assert!(a.state.hub.abonnenten(schluessel).await.is_empty());
}

#[tokio::test]
async fn initialize_call_schickt_angebot_und_teilnehmer_delta() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    dispatcher.dispatch(anruf(&a, "strom-a"), &mut ctx).await.unwrap();

    let delta = warten_auf(&mut rx, NachrichtenTyp::Participant).await;
    match delta.inhalt {
        Inhalt::Teilnehmer(t) => {
            assert_eq!(t.data, TeilnehmerEreignis::Joined);
            assert_eq!(t.stream_id, "strom-a");
            assert_eq!(t.username, "Anna");
        }
        andere => panic!("Falsche Variante: {andere:?}"),
    }

    let angebot = warten_auf(&mut rx, NachrichtenTyp::Offer).await;
    assert_eq!(angebot.server(), Some(a.server));
    assert_eq!(angebot.kanal(), Some(a.voicekanal));
    assert_eq!(ctx.stream_id.as_deref(), Some("strom-a"));
    assert_eq!(a.state.hub.router().sitzungs_anzahl().await, 1);
}

#[tokio::test]
async fn kandidat_vor_antwort_wird_gepuffert() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    dispatcher.dispatch(anruf(&a, "strom-a"), &mut ctx).await.unwrap();
    warten_auf(&mut rx, NachrichtenTyp::Offer).await;
    let peer = a.engine.letzter_peer();

    let kandidat = Umschlag::neu(
        NachrichtenTyp::Candidate,
        Inhalt::WebRtc(WebRtcInhalt {
            candidate: Some(IceKandidat::neu("candidate:1 1 udp 1 10.0.0.1 5000 typ host")),
            ..Default::default()
        }),
    );
    dispatcher.dispatch(kandidat, &mut ctx).await.unwrap();
    assert!(peer.kandidaten().is_empty());

    let antwort = Umschlag::neu(
        NachrichtenTyp::Answer,
        Inhalt::WebRtc(WebRtcInhalt {
            answer: Some(SitzungsBeschreibung::antwort("v=0")),
            ..Default::default()
        }),
    );
    dispatcher.dispatch(antwort, &mut ctx).await.unwrap();
    assert_eq!(peer.kandidaten().len(), 1);
}

#[tokio::test]
async fn antwort_als_data_string_wird_akzeptiert() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    dispatcher.dispatch(anruf(&a, "strom-a"), &mut ctx).await.unwrap();
    warten_auf(&mut rx, NachrichtenTyp::Offer).await;

    let antwort = Umschlag::neu(
        NachrichtenTyp::Answer,
        Inhalt::WebRtc(WebRtcInhalt {
            data: Some(r#"{"type":"answer","sdp":"v=0"}"#.to_string()),
            ..Default::default()
        }),
    );
    dispatcher.dispatch(antwort, &mut ctx).await.unwrap();
}

#[tokio::test]
async fn antwort_ohne_sitzung_ist_fehler() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    let antwort = Umschlag::neu(
        NachrichtenTyp::Answer,
        Inhalt::WebRtc(WebRtcInhalt {
            answer: Some(SitzungsBeschreibung::antwort("v=0")),
            ..Default::default()
        }),
    );
    let e = dispatcher.dispatch(antwort, &mut ctx).await.unwrap_err();
    assert!(matches!(
        e,
        SignalingError::Medien(MedienFehler::KeineSitzung(_))
    ));
}

#[tokio::test]
async fn initialize_call_ohne_server_ist_fehler() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    let mut umschlag = anruf(&a, "strom-a");
    umschlag.server_id = None;
    let e = dispatcher.dispatch(umschlag, &mut ctx).await.unwrap_err();
    assert!(matches!(e, SignalingError::FehlendesFeld("serverId")));
    assert_eq!(a.state.hub.router().sitzungs_anzahl().await, 0);
}

#[tokio::test]
async fn joined_liefert_teilnehmerliste_und_spaetere_deltas() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let gast = a.gast("Bert");
    let (mut ctx_a, _rx_a) = a.verbinden(&a.besitzer);
    let (mut ctx_b, mut rx_b) = a.verbinden(&gast);

    dispatcher.dispatch(anruf(&a, "strom-a"), &mut ctx_a).await.unwrap();

    let joined = Umschlag::neu(NachrichtenTyp::Joined, Inhalt::Keine).mit_server(a.server);
    dispatcher.dispatch(joined, &mut ctx_b).await.unwrap();

    let liste = warten_auf(&mut rx_b, NachrichtenTyp::Participants).await;
    match liste.inhalt {
        Inhalt::Teilnehmerliste(l) => {
            let kanal = l.0.get(&a.voicekanal.to_string()).expect("Kanal fehlt");
            assert_eq!(kanal.get("strom-a").map(|t| t.username.as_str()), Some("Anna"));
        }
        andere => panic!("Falsche Variante: {andere:?}"),
    }
    assert_eq!(a.state.hub.router().sitzungs_anzahl().await, 1);

    let leave = Umschlag::neu(NachrichtenTyp::Leave, Inhalt::Keine);
    dispatcher.dispatch(leave, &mut ctx_a).await.unwrap();

    let delta = warten_auf(&mut rx_b, NachrichtenTyp::Participant).await;
    match delta.inhalt {
        Inhalt::Teilnehmer(t) => {
            assert_eq!(t.data, TeilnehmerEreignis::Left);
            assert_eq!(t.client_id, ctx_a.client_id);
        }
        andere => panic!("Falsche Variante: {andere:?}"),
    }
}

#[tokio::test]
async fn joined_mit_channel_tritt_voice_bei() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    let joined = Umschlag::neu(NachrichtenTyp::Joined, Inhalt::Keine)
        .mit_server(a.server)
        .mit_channel(a.voicekanal.to_string());
    dispatcher.dispatch(joined, &mut ctx).await.unwrap();

    warten_auf(&mut rx, NachrichtenTyp::Offer).await;
    assert_eq!(
        a.state.hub.router().teilnehmer_anzahl(a.server, a.voicekanal).await,
        1
    );
}

#[tokio::test]
async fn leave_ohne_sitzung_ist_noop() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    let leave = Umschlag::neu(NachrichtenTyp::Leave, Inhalt::Keine);
    dispatcher.dispatch(leave, &mut ctx).await.unwrap();
    assert!(a.state.hub.ist_registriert(ctx.client_id).await);
}

#[tokio::test]
async fn volle_queue_trennt_client_und_baut_voice_ab() {
    let a = aufbau_mit(SignalingConfig {
        queue_groesse: 1,
        ..SignalingConfig::default()
    });
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, mut rx) = a.verbinden(&a.besitzer);

    // Teilnehmer-Delta und Angebot passen nicht in eine Queue der Groesse 1
    dispatcher.dispatch(anruf(&a, "strom-a"), &mut ctx).await.unwrap();

    let state = a.state.clone();
    bis(|| {
        let state = state.clone();
        async move { state.hub.router().sitzungs_anzahl().await == 0 }
    })
    .await;

    assert!(!a.state.hub.ist_registriert(ctx.client_id).await);
    assert_eq!(a.state.hub.statistik().await.zwangstrennungen, 1);

    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn initialize_call_ohne_mitgliedschaft_abgelehnt() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let fremd = a.verzeichnis.profil_anlegen("Fremd", "");
    let (mut ctx, _rx) = a.verbinden(&fremd);

    let e = dispatcher
        .dispatch(anruf(&a, "strom-f"), &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(e, SignalingError::Chat(ChatError::KeineBerechtigung(_))));
    assert!(a.state.hub.router().sitzung_von(ctx.client_id).await.is_none());
}

#[tokio::test]
async fn initialize_call_fuer_unbekannten_server_und_kanal_abgelehnt() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    let unbekannter_server = anruf(&a, "strom-a").mit_server(ServerId::new());
    let e = dispatcher
        .dispatch(unbekannter_server, &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(e, SignalingError::Chat(ChatError::ServerNichtGefunden(_))));

    let unbekannter_kanal = anruf(&a, "strom-a").mit_channel(ChannelId::new().to_string());
    let e = dispatcher
        .dispatch(unbekannter_kanal, &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(e, SignalingError::Chat(ChatError::KanalNichtGefunden(_))));

    assert_eq!(a.state.hub.router().sitzungs_anzahl().await, 0);
}

#[tokio::test]
async fn initialize_call_mit_kanal_eines_anderen_servers_abgelehnt() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let (mut ctx, _rx) = a.verbinden(&a.besitzer);

    let anderer = a.verzeichnis.server_anlegen("Nebenan", a.besitzer.id);
    let fremder_kanal = a
        .verzeichnis
        .kanal_anlegen(anderer.id, "Buehne", KanalTyp::Audio);

    let umschlag = anruf(&a, "strom-a").mit_channel(fremder_kanal.id.to_string());
    let e = dispatcher.dispatch(umschlag, &mut ctx).await.unwrap_err();
    assert!(matches!(e, SignalingError::Chat(ChatError::KanalNichtGefunden(_))));
    assert_eq!(a.state.hub.router().sitzungs_anzahl().await, 0);
}

#[tokio::test]
async fn joined_ohne_mitgliedschaft_liefert_keine_teilnehmerliste() {
    let a = aufbau();
    let dispatcher = Dispatcher::neu(a.state.clone());
    let fremd = a.verzeichnis.profil_anlegen("Fremd", "");
    let (mut ctx, mut rx) = a.verbinden(&fremd);

    let joined = Umschlag::neu(NachrichtenTyp::Joined, Inhalt::Keine).mit_server(a.server);
    let e = dispatcher.dispatch(joined, &mut ctx).await.unwrap_err();
    assert!(matches!(e, SignalingError::Chat(ChatError::KeineBerechtigung(_))));

    // Abfrage laeuft durch dieselbe Queue wie alle vorherigen Befehle
    assert_eq!(a.state.hub.statistik().await.server_publikum, 0);
    assert!(rx.try_recv().is_err());
}
