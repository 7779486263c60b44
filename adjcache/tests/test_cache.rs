use adjcache::TrackCache;
use adjmedia::{Error as MediaError, MediaFetcher, Result as MediaResult, TrackProbe, TrackReference, Transcoder};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Child;

/// Fetcher de test : compte les invocations, titre dérivé de la référence
struct CountingFetcher {
    probes: AtomicUsize,
    downloads: AtomicUsize,
    /// Références dont le téléchargement doit échouer
    failing: Vec<String>,
    /// Latence artificielle du téléchargement (pour les tests single-flight)
    download_delay: Duration,
}

impl CountingFetcher {
    fn new() -> Self {
        Self {
            probes: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            failing: Vec::new(),
            download_delay: Duration::ZERO,
        }
    }

    fn failing_for(reference: &str) -> Self {
        let mut fetcher = Self::new();
        fetcher.failing.push(reference.to_string());
        fetcher
    }

    fn slow(delay: Duration) -> Self {
        let mut fetcher = Self::new();
        fetcher.download_delay = delay;
        fetcher
    }
}

#[async_trait]
impl MediaFetcher for CountingFetcher {
    async fn probe(&self, track: &TrackReference) -> MediaResult<TrackProbe> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        // La partie après le dernier '/' sert de titre brut
        let title = track.as_str().rsplit('/').next().unwrap_or("untitled").to_string();
        Ok(TrackProbe {
            title,
            uploader: "Test Uploader".to_string(),
            id: track.as_str().to_string(),
        })
    }

    async fn download(&self, track: &TrackReference, target: &Path) -> MediaResult<()> {
        if !self.download_delay.is_zero() {
            tokio::time::sleep(self.download_delay).await;
        }
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| f == track.as_str()) {
            return Err(MediaError::Download {
                reference: track.to_string(),
                detail: "simulated failure".to_string(),
            });
        }
        tokio::fs::write(target, b"downloaded-audio").await?;
        Ok(())
    }

    async fn list_playlist(&self, playlist: &TrackReference) -> MediaResult<Vec<TrackReference>> {
        Ok(vec![playlist.clone()])
    }
}

/// Transcodeur de test : copie l'entrée vers la sortie
struct CopyTranscoder {
    transcodes: AtomicUsize,
}

impl CopyTranscoder {
    fn new() -> Self {
        Self {
            transcodes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcoder for CopyTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, _bitrate: u32) -> MediaResult<()> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    fn spawn_relay(&self, _pipe: &Path, _ingest_url: &str, _bitrate: u32) -> MediaResult<Child> {
        unreachable!("cache tests never spawn the persistent relay")
    }
}

fn create_cache(
    fetcher: Arc<CountingFetcher>,
    transcoder: Arc<CopyTranscoder>,
) -> (TempDir, TrackCache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = TrackCache::new(
        dir.path().join("cache"),
        dir.path().join("scratch"),
        128,
        fetcher,
        transcoder,
    )
    .unwrap();
    (dir, cache)
}

#[tokio::test]
async fn test_second_call_is_a_hit() {
    let fetcher = Arc::new(CountingFetcher::new());
    let transcoder = Arc::new(CopyTranscoder::new());
    let (_dir, cache) = create_cache(fetcher.clone(), transcoder.clone());

    let track = TrackReference::new("https://example.com/watch/My Song");

    let first = cache.ensure_artifact(&track).await.unwrap();
    let second = cache.ensure_artifact(&track).await.unwrap();

    // Même chemin, un seul téléchargement, un seul transcodage
    assert_eq!(first.artifact_path, second.artifact_path);
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(transcoder.transcodes.load(Ordering::SeqCst), 1);
    assert!(first.artifact_path.exists());
}

#[tokio::test]
async fn test_concurrent_requests_share_one_flight() {
    let fetcher = Arc::new(CountingFetcher::slow(Duration::from_millis(100)));
    let transcoder = Arc::new(CopyTranscoder::new());
    let (_dir, cache) = create_cache(fetcher.clone(), transcoder.clone());
    let cache = Arc::new(cache);

    let track = TrackReference::new("https://example.com/watch/Shared Song");

    let a = {
        let cache = cache.clone();
        let track = track.clone();
        tokio::spawn(async move { cache.ensure_artifact(&track).await })
    };
    let b = {
        let cache = cache.clone();
        let track = track.clone();
        tokio::spawn(async move { cache.ensure_artifact(&track).await })
    };

    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(a.artifact_path, b.artifact_path);
    // Le second demandeur a attendu le premier vol au lieu de le dupliquer
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(transcoder.transcodes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_download_leaves_cache_consistent() {
    let reference = "https://example.com/watch/Broken Song";
    let fetcher = Arc::new(CountingFetcher::failing_for(reference));
    let transcoder = Arc::new(CopyTranscoder::new());
    let (_dir, cache) = create_cache(fetcher.clone(), transcoder.clone());

    let track = TrackReference::new(reference);

    let err = cache.ensure_artifact(&track).await.unwrap_err();
    assert!(matches!(err, adjcache::Error::Download(_)));
    // Rien dans le cache, pas de transcodage lancé
    assert_eq!(transcoder.transcodes.load(Ordering::SeqCst), 0);
    assert!(!cache.artifact_path("Test Uploader - Broken Song").exists());

    // Une nouvelle tentative repart de zéro
    let _ = cache.ensure_artifact(&track).await.unwrap_err();
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_normalized_collision_is_a_hit() {
    let fetcher = Arc::new(CountingFetcher::new());
    let transcoder = Arc::new(CopyTranscoder::new());
    let (_dir, cache) = create_cache(fetcher.clone(), transcoder.clone());

    // Deux titres bruts différents, même texte une fois le bruit retiré
    let a = TrackReference::new("https://example.com/watch/Song (Official Video)");
    let b = TrackReference::new("https://example.com/watch/Song [official audio]");

    let first = cache.ensure_artifact(&a).await.unwrap();
    let second = cache.ensure_artifact(&b).await.unwrap();

    // Collision volontaire : le second est un hit
    assert_eq!(first.artifact_path, second.artifact_path);
    assert_eq!(fetcher.downloads.load(Ordering::SeqCst), 1);
}
