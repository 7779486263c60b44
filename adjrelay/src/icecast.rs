//! Client du protocole admin du serveur de diffusion
//!
//! Deux opérations, toutes deux en GET + Basic-Auth : mise à jour du
//! now-playing d'un mount, et récupération du document de stats serveur
//! (XML) dont on extrait le compteur d'auditeurs du mount configuré.
//!
//! Le client est sans état et ne retente rien lui-même : le synchroniseur
//! avale tous les échecs à sa frontière.

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default timeout for admin HTTP requests (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client admin d'un serveur de diffusion de type Icecast
#[derive(Debug, Clone)]
pub struct IcecastAdmin {
    client: Client,
    base_url: String,
    user: String,
    password: String,
    mount: String,
}

impl IcecastAdmin {
    /// Crée un client pour `base_url` (ex: `http://localhost:8000`)
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        mount: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
            mount: mount.into(),
        })
    }

    /// Mount configuré (ex: `/live`)
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Pousse le titre courant vers le mount (mode `updinfo`)
    pub async fn update_metadata(&self, song: &str) -> Result<(), reqwest::Error> {
        debug!(song = %song, mount = %self.mount, "Pushing now-playing metadata");
        self.client
            .get(format!("{}/admin/metadata", self.base_url))
            .query(&[
                ("mount", self.mount.as_str()),
                ("mode", "updinfo"),
                ("song", song),
            ])
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Récupère le document de stats serveur brut
    pub async fn fetch_stats(&self) -> Result<String, reqwest::Error> {
        self.client
            .get(format!("{}/admin/stats", self.base_url))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Compteur d'auditeurs du mount configuré ; `None` si introuvable
    pub async fn listener_count(&self) -> Result<Option<u32>, reqwest::Error> {
        let stats = self.fetch_stats().await?;
        Ok(parse_listeners(&stats, &self.mount))
    }
}

/// Extrait `<source mount="…">…<listeners>N</listeners>…</source>` du
/// document de stats pour le mount demandé
///
/// Lecture en flux : la forme du document varie selon les versions du
/// serveur, seuls le bloc `source` du mount et son champ `listeners` nous
/// intéressent. Toute anomalie de parsing vaut `None`, jamais une erreur.
pub fn parse_listeners(stats_xml: &str, mount: &str) -> Option<u32> {
    let mut reader = Reader::from_str(stats_xml);
    reader.config_mut().trim_text(true);

    let mut in_target_source = false;
    let mut in_listeners = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.name().as_ref() {
                b"source" => {
                    in_target_source = element.attributes().flatten().any(|attr| {
                        attr.key.as_ref() == b"mount"
                            && attr.unescape_value().is_ok_and(|v| v == mount)
                    });
                }
                b"listeners" if in_target_source => {
                    in_listeners = true;
                }
                _ => {}
            },
            Ok(Event::Text(text)) if in_listeners => {
                let decoded = text.decode().ok()?;
                return quick_xml::escape::unescape(&decoded).ok()?.trim().parse().ok();
            }
            Ok(Event::End(element)) => match element.name().as_ref() {
                b"source" => in_target_source = false,
                b"listeners" => in_listeners = false,
                _ => {}
            },
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STATS_SAMPLE: &str = r#"<?xml version="1.0"?>
<icestats>
  <source mount="/other"><listeners>42</listeners></source>
  <source mount="/live">
    <server_name>AutoDJ</server_name>
    <listeners>7</listeners>
  </source>
</icestats>"#;

    #[test]
    fn listeners_parsed_for_matching_mount() {
        assert_eq!(parse_listeners(STATS_SAMPLE, "/live"), Some(7));
        // l'autre mount n'est pas confondu
        assert_eq!(parse_listeners(STATS_SAMPLE, "/other"), Some(42));
    }

    #[test]
    fn missing_mount_yields_none() {
        assert_eq!(parse_listeners(STATS_SAMPLE, "/absent"), None);
    }

    #[test]
    fn malformed_document_yields_none() {
        assert_eq!(parse_listeners("not xml at all", "/live"), None);
        assert_eq!(
            parse_listeners("<source mount=\"/live\"><listeners>NaN</listeners></source>", "/live"),
            None
        );
    }

    #[tokio::test]
    async fn update_metadata_hits_admin_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/metadata"))
            .and(query_param("mount", "/live"))
            .and(query_param("mode", "updinfo"))
            .and(query_param("song", "Artist - Song"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let admin = IcecastAdmin::new(server.uri(), "admin", "hackme", "/live").unwrap();
        admin.update_metadata("Artist - Song").await.unwrap();
    }

    #[tokio::test]
    async fn listener_count_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_string(STATS_SAMPLE))
            .mount(&server)
            .await;

        let admin = IcecastAdmin::new(server.uri(), "admin", "hackme", "/live").unwrap();
        assert_eq!(admin.listener_count().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn admin_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin/metadata"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let admin = IcecastAdmin::new(server.uri(), "admin", "wrong", "/live").unwrap();
        assert!(admin.update_metadata("x").await.is_err());
    }
}
