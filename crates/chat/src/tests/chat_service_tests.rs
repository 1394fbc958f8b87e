//! Unit-Tests fuer den ChatService

use std::sync::Arc;

use funkhaus_core::models::{KanalTyp, MitgliedsRolle, Profil};
use funkhaus_core::{ChannelId, KanalSchluessel, MessageId, ServerId};
use funkhaus_protocol::{Inhalt, NachrichtenTyp, Umschlag};
use parking_lot::Mutex;

use crate::{
    error::ChatError,
    service::{ChatService, EreignisVerteiler},
    speicher::InMemoryVerzeichnis,
    verzeichnis::GELOESCHT_INHALT,
};

/// Merkt sich alle verteilten Umschlaege
#[derive(Default)]
struct Mitschnitt {
    gesendet: Mutex<Vec<(KanalSchluessel, Umschlag)>>,
}

impl EreignisVerteiler for Mitschnitt {
    fn an_channel_senden(&self, schluessel: KanalSchluessel, umschlag: Umschlag) {
        self.gesendet.lock().push((schluessel, umschlag));
    }
}

struct Aufbau {
    service: Arc<ChatService>,
    verzeichnis: Arc<InMemoryVerzeichnis>,
    mitschnitt: Arc<Mitschnitt>,
    besitzer: Profil,
    server: ServerId,
    kanal: ChannelId,
}

fn aufbau() -> Aufbau {
    let verzeichnis = Arc::new(InMemoryVerzeichnis::neu());
    let mitschnitt = Arc::new(Mitschnitt::default());
    let besitzer = verzeichnis.profil_anlegen("Anna", "https://bilder/anna.png");
    let server = verzeichnis.server_anlegen("Stammtisch", besitzer.id);
    let kanal = verzeichnis.kanal_anlegen(server.id, "allgemein", KanalTyp::Text);
    let service = ChatService::neu(verzeichnis.clone(), verzeichnis.clone(), mitschnitt.clone());
    Aufbau {
        service,
        verzeichnis,
        mitschnitt,
        besitzer,
        server: server.id,
        kanal: kanal.id,
    }
}

#[test]
fn nachricht_erstellen_verteilt_an_nachrichten_schluessel() {
    let a = aufbau();

    let nachricht = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, "Hallo Welt!", None)
        .expect("Nachricht erstellen fehlgeschlagen");
    assert_eq!(nachricht.content, "Hallo Welt!");
    assert!(!nachricht.deleted);

    let gesendet = a.mitschnitt.gesendet.lock();
    assert_eq!(gesendet.len(), 1);
    let (schluessel, umschlag) = &gesendet[0];
    assert_eq!(*schluessel, KanalSchluessel::nachrichten(a.kanal));
    assert_eq!(umschlag.typ, NachrichtenTyp::Message);
    assert_eq!(umschlag.channel.as_deref(), Some(schluessel.als_str()));
    match &umschlag.inhalt {
        Inhalt::Chat(c) => {
            assert_eq!(c.id, Some(nachricht.id));
            assert_eq!(c.content.as_deref(), Some("Hallo Welt!"));
            assert!(c.weitere.contains_key("member"), "Mitglied muss eingebettet sein");
        }
        andere => panic!("Falsche Variante: {andere:?}"),
    }
}

#[test]
fn leere_nachricht_abgelehnt() {
    let a = aufbau();
    let result = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, "   ", None);
    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
    assert!(a.mitschnitt.gesendet.lock().is_empty());
}

#[test]
fn leerer_text_mit_datei_erlaubt() {
    let a = aufbau();
    let nachricht = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, "", Some("https://dateien/x.png"))
        .expect("Datei-Nachricht muss erlaubt sein");
    assert_eq!(nachricht.datei_url.as_deref(), Some("https://dateien/x.png"));
}

#[test]
fn zu_lange_nachricht_abgelehnt() {
    let a = aufbau();
    let zu_lang = "x".repeat(4097);
    let result = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, &zu_lang, None);
    assert!(matches!(result, Err(ChatError::UngueltigeEingabe(_))));
}

#[test]
fn unbekannter_server_und_kanal() {
    let a = aufbau();
    let r = a
        .service
        .nachricht_erstellen(a.besitzer.id, ServerId::new(), a.kanal, "x", None);
    assert!(matches!(r, Err(ChatError::ServerNichtGefunden(_))));

    let r = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, ChannelId::new(), "x", None);
    assert!(matches!(r, Err(ChatError::KanalNichtGefunden(_))));
}

#[test]
fn kanal_eines_anderen_servers_abgelehnt() {
    let a = aufbau();
    let fremder_server = a.verzeichnis.server_anlegen("Anderswo", a.besitzer.id);
    let fremder_kanal =
        a.verzeichnis
            .kanal_anlegen(fremder_server.id, "dort", KanalTyp::Text);

    let r = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, fremder_kanal.id, "x", None);
    assert!(matches!(r, Err(ChatError::KanalNichtGefunden(_))));
}

#[test]
fn nicht_mitglied_ohne_berechtigung() {
    let a = aufbau();
    let fremd = a.verzeichnis.profil_anlegen("Fremd", "");
    let r = a
        .service
        .nachricht_erstellen(fremd.id, a.server, a.kanal, "Hallo?", None);
    assert!(matches!(r, Err(ChatError::KeineBerechtigung(_))));
}

#[test]
fn server_zulassung_prueft_server_und_mitgliedschaft() {
    let a = aufbau();
    let mitglied = a.service.server_zulassen(a.besitzer.id, a.server).unwrap();
    assert_eq!(mitglied.role, MitgliedsRolle::Admin);

    let fremd = a.verzeichnis.profil_anlegen("Fremd", "");
    assert!(matches!(
        a.service.server_zulassen(fremd.id, a.server),
        Err(ChatError::KeineBerechtigung(_))
    ));
    assert!(matches!(
        a.service.server_zulassen(a.besitzer.id, ServerId::new()),
        Err(ChatError::ServerNichtGefunden(_))
    ));
}

#[test]
fn nachricht_editieren_verteilt_an_update_schluessel() {
    let a = aufbau();
    let n = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, "Original", None)
        .unwrap();

    let editiert = a
        .service
        .nachricht_editieren(a.besitzer.id, a.server, a.kanal, n.id, "Editiert")
        .expect("Editieren fehlgeschlagen");
    assert_eq!(editiert.content, "Editiert");

    let gesendet = a.mitschnitt.gesendet.lock();
    assert_eq!(gesendet.len(), 2);
    assert_eq!(gesendet[1].0, KanalSchluessel::aktualisierungen(a.kanal));
}

#[test]
fn fremde_nachricht_nicht_editierbar_auch_fuer_admin() {
    let a = aufbau();
    let gast = a.verzeichnis.profil_anlegen("Gast", "");
    a.verzeichnis
        .mitglied_hinzufuegen(a.server, gast.id, MitgliedsRolle::Guest);

    let n = a
        .service
        .nachricht_erstellen(gast.id, a.server, a.kanal, "Vom Gast", None)
        .unwrap();

    // Besitzer ist ADMIN, darf aber trotzdem nicht editieren
    let r = a
        .service
        .nachricht_editieren(a.besitzer.id, a.server, a.kanal, n.id, "Uebernommen");
    assert!(matches!(r, Err(ChatError::KeineBerechtigung(_))));
}

#[test]
fn moderator_darf_fremde_nachricht_loeschen() {
    let a = aufbau();
    let gast = a.verzeichnis.profil_anlegen("Gast", "");
    a.verzeichnis
        .mitglied_hinzufuegen(a.server, gast.id, MitgliedsRolle::Guest);
    let moderator = a.verzeichnis.profil_anlegen("Mod", "");
    a.verzeichnis
        .mitglied_hinzufuegen(a.server, moderator.id, MitgliedsRolle::Moderator);

    let n = a
        .service
        .nachricht_erstellen(gast.id, a.server, a.kanal, "Spam", Some("https://x"))
        .unwrap();

    let geloescht = a
        .service
        .nachricht_loeschen(moderator.id, a.server, a.kanal, n.id)
        .expect("Moderator muss loeschen duerfen");
    assert!(geloescht.deleted);
    assert_eq!(geloescht.content, GELOESCHT_INHALT);
    assert!(geloescht.datei_url.is_none());
}

#[test]
fn gast_darf_fremde_nachricht_nicht_loeschen() {
    let a = aufbau();
    let gast = a.verzeichnis.profil_anlegen("Gast", "");
    a.verzeichnis
        .mitglied_hinzufuegen(a.server, gast.id, MitgliedsRolle::Guest);

    let n = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, "Vom Admin", None)
        .unwrap();

    let r = a.service.nachricht_loeschen(gast.id, a.server, a.kanal, n.id);
    assert!(matches!(r, Err(ChatError::KeineBerechtigung(_))));
}

#[test]
fn geloeschte_nachricht_nicht_mehr_editierbar() {
    let a = aufbau();
    let n = a
        .service
        .nachricht_erstellen(a.besitzer.id, a.server, a.kanal, "Weg", None)
        .unwrap();
    a.service
        .nachricht_loeschen(a.besitzer.id, a.server, a.kanal, n.id)
        .unwrap();

    let r = a
        .service
        .nachricht_editieren(a.besitzer.id, a.server, a.kanal, n.id, "Doch nicht");
    assert!(matches!(r, Err(ChatError::NachrichtNichtGefunden(_))));

    let r = a
        .service
        .nachricht_loeschen(a.besitzer.id, a.server, a.kanal, MessageId::new());
    assert!(matches!(r, Err(ChatError::NachrichtNichtGefunden(_))));
}

#[test]
fn direktnachrichten_nur_fuer_beteiligte() {
    let a = aufbau();
    let bert = a.verzeichnis.profil_anlegen("Bert", "");
    let m_bert = a
        .verzeichnis
        .mitglied_hinzufuegen(a.server, bert.id, MitgliedsRolle::Guest);
    let m_anna = a
        .verzeichnis
        .mitglied_hinzufuegen(a.server, a.besitzer.id, MitgliedsRolle::Admin);
    let konversation = a.verzeichnis.konversation_anlegen(m_anna, m_bert);

    let dm = a
        .service
        .direktnachricht_erstellen(bert.id, konversation.id, "Psst", None)
        .expect("Direktnachricht erstellen fehlgeschlagen");
    assert_eq!(
        a.mitschnitt.gesendet.lock().last().map(|(s, _)| s.clone()),
        Some(KanalSchluessel::nachrichten(konversation.id))
    );

    // Anna ist beteiligt, aber nicht Verfasserin
    let r = a
        .service
        .direktnachricht_editieren(a.besitzer.id, konversation.id, dm.id, "Nein");
    assert!(matches!(r, Err(ChatError::KeineBerechtigung(_))));
    let r = a
        .service
        .direktnachricht_loeschen(a.besitzer.id, konversation.id, dm.id);
    assert!(matches!(r, Err(ChatError::KeineBerechtigung(_))));

    // Ein Unbeteiligter findet die Konversation nicht
    let fremd = a.verzeichnis.profil_anlegen("Fremd", "");
    let r = a
        .service
        .direktnachricht_erstellen(fremd.id, konversation.id, "Hallo", None);
    assert!(matches!(r, Err(ChatError::KonversationNichtGefunden(_))));

    let geloescht = a
        .service
        .direktnachricht_loeschen(bert.id, konversation.id, dm.id)
        .unwrap();
    assert!(geloescht.deleted);
    assert_eq!(
        a.mitschnitt.gesendet.lock().last().map(|(s, _)| s.clone()),
        Some(KanalSchluessel::aktualisierungen(konversation.id))
    );
}
