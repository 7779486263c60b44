//! Synchroniseur métadonnées / auditeurs
//!
//! Deux tâches périodiques indépendantes, découplées du séquenceur : leur
//! panne dégrade l'observabilité, jamais l'audio. Chaque tick a sa propre
//! frontière d'erreur et tous les échecs y sont avalés (log debug). Les
//! tâches s'arrêtent proprement au prochain tick après l'annulation ; un
//! tick en vol termine toujours.

use crate::error::Error;
use crate::icecast::IcecastAdmin;
use crate::state::SharedState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Intervalle par défaut de poussée du now-playing
pub const DEFAULT_METADATA_INTERVAL: Duration = Duration::from_secs(1);

/// Intervalle par défaut du poll des stats
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Synchroniseur du serveur de diffusion
pub struct Synchronizer {
    admin: Arc<IcecastAdmin>,
    state: SharedState,
    metadata_interval: Duration,
    stats_interval: Duration,
    token: CancellationToken,
}

impl Synchronizer {
    pub fn new(
        admin: Arc<IcecastAdmin>,
        state: SharedState,
        metadata_interval: Duration,
        stats_interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            admin,
            state,
            metadata_interval,
            stats_interval,
            token,
        }
    }

    /// Lance les deux tâches périodiques et retourne leurs handles
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        info!(
            metadata_interval = ?self.metadata_interval,
            stats_interval = ?self.stats_interval,
            mount = %self.admin.mount(),
            "Starting broadcast synchronizer"
        );
        vec![
            tokio::spawn(metadata_push_loop(
                self.admin.clone(),
                self.state.clone(),
                self.metadata_interval,
                self.token.clone(),
            )),
            tokio::spawn(listener_poll_loop(
                self.admin,
                self.state,
                self.stats_interval,
                self.token,
            )),
        ]
    }
}

/// Pousse le titre courant vers le serveur, best-effort
async fn metadata_push_loop(
    admin: Arc<IcecastAdmin>,
    state: SharedState,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(title) = state.current_title() else {
            continue;
        };
        if let Err(err) = admin.update_metadata(&title).await {
            // Avalé : la poussée suivante réessaiera d'elle-même
            debug!(error = %Error::MetadataSync(err), "Metadata push skipped");
        }
    }
    debug!("Metadata push loop stopped");
}

/// Interroge les stats serveur et range le compteur d'auditeurs
async fn listener_poll_loop(
    admin: Arc<IcecastAdmin>,
    state: SharedState,
    period: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        match admin.listener_count().await {
            Ok(listeners) => state.set_listeners(listeners),
            Err(err) => {
                // Mesure indisponible : marquer inconnu plutôt que du stale
                state.set_listeners(None);
                debug!(error = %Error::ListenerPoll(err), "Listener poll failed");
            }
        }
    }
    debug!("Listener poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn listener_poll_updates_state_and_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<icestats><source mount="/live"><listeners>3</listeners></source></icestats>"#,
            ))
            .mount(&server)
            .await;

        let admin = Arc::new(IcecastAdmin::new(server.uri(), "admin", "pw", "/live").unwrap());
        let state = SharedState::new();
        let token = CancellationToken::new();

        let handles = Synchronizer::new(
            admin,
            state.clone(),
            Duration::from_millis(20),
            Duration::from_millis(20),
            token.clone(),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(state.snapshot().listeners, Some(3));

        token.cancel();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("synchronizer task should stop after cancellation")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn poll_failure_marks_listeners_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/stats"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let admin = Arc::new(IcecastAdmin::new(server.uri(), "admin", "pw", "/live").unwrap());
        let state = SharedState::new();
        state.set_listeners(Some(9));
        let token = CancellationToken::new();

        let handles = Synchronizer::new(
            admin,
            state.clone(),
            Duration::from_millis(20),
            Duration::from_millis(20),
            token.clone(),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(state.snapshot().listeners, None);

        token.cancel();
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
        }
    }
}
