//! Hub – Verbindungsregister plus Voice-Router hinter einer Fassade
//!
//! Der Hub verknuepft das [`RegisterHandle`] mit dem [`SpurRouter`]:
//! der Router stellt seine Signaling-Nachrichten ueber das Register zu,
//! und das Register baut bei Zwangstrennungen die Voice-Sitzung ueber den
//! Router ab. Deshalb wird zuerst das Register-Handle erzeugt, dann der
//! Router, und erst danach der Register-Task gestartet.

use std::sync::Arc;

use funkhaus_chat::EreignisVerteiler;
use funkhaus_core::{ChannelId, ClientId, KanalSchluessel, ServerId};
use funkhaus_protocol::Umschlag;
use funkhaus_voice::{MedienEngine, MedienResult, RouterKonfig, SpurRouter, Teilnehmer};
use tokio::sync::mpsc;

use crate::broadcast::{ClientSender, RegisterHandle, RegisterStatistik, VoiceAbmeldung};

impl VoiceAbmeldung for SpurRouter {
    fn voice_abmelden(&self, client: ClientId) {
        let router = self.clone();
        tokio::spawn(async move {
            router.verlassen(client).await;
        });
    }
}

/// Zentrale Fassade fuer alle Verbindungen
#[derive(Clone)]
pub struct Hub {
    register: RegisterHandle,
    router: SpurRouter,
    queue_groesse: usize,
}

impl Hub {
    /// Baut Register und Router auf und startet den Register-Task
    ///
    /// Muss innerhalb einer Tokio-Runtime aufgerufen werden.
    pub fn neu(engine: Arc<dyn MedienEngine>, konfig: RouterKonfig, queue_groesse: usize) -> Self {
        let (register, schleife) = RegisterHandle::neu();
        let router = SpurRouter::neu(engine, Arc::new(register.clone()), konfig);
        schleife.starten(Arc::new(router.clone()));
        Self {
            register,
            router,
            queue_groesse,
        }
    }

    // -----------------------------------------------------------------------
    // Verbindungen
    // -----------------------------------------------------------------------

    /// Registriert einen Client und liefert das Ende seiner Send-Queue
    pub fn registrieren(&self, client: ClientId) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(self.queue_groesse);
        self.register.registrieren(ClientSender::neu(client, tx));
        rx
    }

    /// Entfernt den Client aus allen Tabellen und schliesst seine Queue
    pub fn abmelden(&self, client: ClientId) {
        self.register.abmelden(client);
    }

    pub fn abonnieren(&self, client: ClientId, schluessel: KanalSchluessel) {
        self.register.abonnieren(client, schluessel);
    }

    pub fn abbestellen(&self, client: ClientId, schluessel: KanalSchluessel) {
        self.register.abbestellen(client, schluessel);
    }

    /// Nimmt den Client ins Server-Publikum auf und schickt ihm die
    /// aktuelle Teilnehmerliste des Servers
    pub async fn server_beitreten(&self, client: ClientId, server: ServerId) {
        self.register.server_beitreten(client, server);
        let liste = self.router.teilnehmerliste(server).await;
        self.register
            .an_client(client, &Umschlag::teilnehmerliste(server, liste));
    }

    // -----------------------------------------------------------------------
    // Voice
    // -----------------------------------------------------------------------

    /// Tritt einem Voice-Kanal bei; der Client gehoert danach auch zum
    /// Publikum des Servers
    pub async fn voice_beitreten(
        &self,
        teilnehmer: Teilnehmer,
        server: ServerId,
        kanal: ChannelId,
    ) -> MedienResult<()> {
        self.register.server_beitreten(teilnehmer.client_id, server);
        self.router.beitreten(teilnehmer, server, kanal).await
    }

    pub async fn voice_verlassen(&self, client: ClientId) -> bool {
        self.router.verlassen(client).await
    }

    // -----------------------------------------------------------------------
    // Verteilung
    // -----------------------------------------------------------------------

    pub fn an_channel_senden(&self, schluessel: KanalSchluessel, umschlag: &Umschlag) {
        self.register.an_channel(schluessel, umschlag);
    }

    pub fn an_server_senden(&self, server: ServerId, umschlag: &Umschlag) {
        self.register.an_server(server, umschlag);
    }

    pub fn an_client_senden(&self, client: ClientId, umschlag: &Umschlag) {
        self.register.an_client(client, umschlag);
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub async fn abonnenten(&self, schluessel: KanalSchluessel) -> Vec<ClientId> {
        self.register.abonnenten(schluessel).await
    }

    pub async fn ist_registriert(&self, client: ClientId) -> bool {
        self.register.ist_registriert(client).await
    }

    pub async fn client_anzahl(&self) -> usize {
        self.register.statistik().await.clients
    }

    pub async fn statistik(&self) -> RegisterStatistik {
        self.register.statistik().await
    }

    pub fn router(&self) -> &SpurRouter {
        &self.router
    }

    /// Verteiler fuer den Chat-Service
    pub fn verteiler(&self) -> Arc<dyn EreignisVerteiler> {
        Arc::new(self.register.clone())
    }
}
