use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gallery_core::{GalleryClient, GalleryError};
use tokio::sync::mpsc;

use crate::cache::IndexCache;
use crate::sync::{SyncEngine, SyncError, SyncGate, SyncProgress};
use crate::transcode::{DEFAULT_MAX_EDGE, DEFAULT_QUALITY, Transcoder};
use crate::upload::{
    DEFAULT_UPLOAD_CONCURRENCY, SourceFile, UploadEvent, UploadSummary, upload_batch,
};
use crate::view::{ListPresenter, VirtualList};

const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
const DEFAULT_PAGE_SIZE: u32 = 1000;
const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CACHE_MAX_ITEMS: usize = 5_000;
const CACHE_DIR_NAME: &str = "gallery-client";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub page_size: u32,
    pub upload_concurrency: usize,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub cache_max_items: usize,
    pub max_edge: u32,
    pub quality: f32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let cache_dir = std::env::var("GALLERY_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_dir());
        Self {
            api_base: std::env::var("GALLERY_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            page_size: read_env("GALLERY_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            upload_concurrency: read_env(
                "GALLERY_UPLOAD_CONCURRENCY",
                DEFAULT_UPLOAD_CONCURRENCY,
            ),
            cache_dir,
            cache_ttl: Duration::from_secs(read_env(
                "GALLERY_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            cache_max_items: read_env("GALLERY_CACHE_MAX_ITEMS", DEFAULT_CACHE_MAX_ITEMS),
            max_edge: read_env("GALLERY_MAX_EDGE", DEFAULT_MAX_EDGE),
            quality: read_env("GALLERY_QUALITY", DEFAULT_QUALITY),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            cache_dir: default_cache_dir(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_max_items: DEFAULT_CACHE_MAX_ITEMS,
            max_edge: DEFAULT_MAX_EDGE,
            quality: DEFAULT_QUALITY,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

fn read_env<T: FromStr>(name: &str, default: T) -> T {
    parse_or(std::env::var(name).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Hooks for the user-facing surface the core does not own: toasts and
/// progress percentages.
pub trait Notifier {
    fn notice(&mut self, kind: NoticeKind, message: &str);
    fn progress(&mut self, percent: u8);
}

/// The one in-flight delete slot. At most one delete is ever pending;
/// every resolution path clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    pub filename: String,
}

/// Coordinator owning the shared state: the API client, the persistent
/// index cache, the rendered view, and the sync engine. The sync engine
/// only ever feeds pages back through callbacks; all view mutation
/// happens here.
pub struct GalleryApp<P: ListPresenter, N: Notifier> {
    client: GalleryClient,
    cache: IndexCache,
    engine: SyncEngine,
    transcoder: Transcoder,
    view: VirtualList,
    presenter: P,
    notifier: N,
    pending_delete: Option<PendingDelete>,
    upload_concurrency: usize,
}

impl<P: ListPresenter, N: Notifier> GalleryApp<P, N> {
    pub fn new(config: &AppConfig, presenter: P, notifier: N) -> Result<Self, GalleryError> {
        let client = GalleryClient::new(&config.api_base)?;
        let cache = IndexCache::at_dir(config.cache_dir.clone())
            .with_limits(config.cache_ttl, config.cache_max_items);
        let engine = SyncEngine::new(client.clone(), config.page_size);
        Ok(Self {
            client,
            cache,
            engine,
            transcoder: Transcoder::new(config.max_edge, config.quality),
            view: VirtualList::new(),
            presenter,
            notifier,
            pending_delete: None,
            upload_concurrency: config.upload_concurrency.max(1),
        })
    }

    pub fn view(&self) -> &VirtualList {
        &self.view
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn sync_gate(&self) -> SyncGate {
        self.engine.gate()
    }

    pub fn pending_delete(&self) -> Option<&PendingDelete> {
        self.pending_delete.as_ref()
    }

    /// Renders whatever the cache holds for an immediate first paint,
    /// then reconciles against the server with a full sync.
    pub async fn startup(&mut self) {
        if let Some(items) = self.cache.read() {
            eprintln!("[gallery] cached index: {} items", items.len());
            self.view.set_items(items, &mut self.presenter).await;
        }
        let _ = self.refresh().await;
    }

    /// Runs a full paginated sync. Each page re-feeds the view as it
    /// arrives; on success the merged set is persisted to the cache in a
    /// single write. On failure the previously rendered state stays
    /// visible.
    pub async fn refresh(&mut self) -> Result<usize, SyncError> {
        let (page_tx, mut page_rx) = mpsc::unbounded_channel();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<SyncProgress>();
        let engine = self.engine.clone();
        let task = tokio::spawn(async move {
            engine
                .run(
                    move |accumulated| {
                        let _ = page_tx.send(accumulated.to_vec());
                    },
                    move |progress| {
                        let _ = progress_tx.send(progress);
                    },
                )
                .await
        });

        // Both senders drop when the engine task finishes; the else
        // branch fires once both channels have drained.
        loop {
            tokio::select! {
                Some(items) = page_rx.recv() => {
                    self.view.set_items(items, &mut self.presenter).await;
                }
                Some(progress) = progress_rx.recv() => {
                    self.notifier.progress(progress.percent());
                }
                else => break,
            }
        }

        let outcome = match task.await {
            Ok(result) => result,
            Err(join) => Err(SyncError::from(join)),
        };
        match outcome {
            Ok(items) => {
                let count = items.len();
                self.cache.write(&items);
                self.view.set_items(items, &mut self.presenter).await;
                self.notifier.progress(100);
                self.notifier
                    .notice(NoticeKind::Info, &format!("gallery updated: {count} items"));
                Ok(count)
            }
            Err(err) => {
                self.notifier
                    .notice(NoticeKind::Error, &format!("gallery sync failed: {err}"));
                Err(err)
            }
        }
    }

    pub async fn search(&mut self, term: &str) {
        self.view.set_search_term(term, &mut self.presenter).await;
    }

    /// Extends the materialized view; called from the scroll-proximity
    /// hook (`view().near_end(..)`).
    pub async fn render_more(&mut self) {
        self.view.render_more(&mut self.presenter).await;
    }

    /// Reserves the single delete slot. Returns false when another
    /// delete is still awaiting confirmation.
    pub fn request_delete(&mut self, filename: &str) -> bool {
        if self.pending_delete.is_some() {
            return false;
        }
        self.pending_delete = Some(PendingDelete {
            filename: filename.to_string(),
        });
        true
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Resolves the pending delete. The slot is taken before anything
    /// can fail, so success, failure, and a missing slot all leave the
    /// app interactive with no delete outstanding.
    pub async fn confirm_delete(&mut self) {
        let Some(pending) = self.pending_delete.take() else {
            return;
        };
        match self.client.delete(&pending.filename).await {
            Ok(message) => {
                self.view.remove(&pending.filename, &mut self.presenter);
                self.cache.write(self.view.items());
                self.notifier.notice(NoticeKind::Info, &message);
            }
            Err(err) => {
                self.notifier.notice(
                    NoticeKind::Error,
                    &format!("failed to delete {}: {err}", pending.filename),
                );
            }
        }
    }

    /// Validates, converts, and uploads a batch, then resyncs to
    /// reconcile the view with what the server actually accepted.
    pub async fn upload_files(&mut self, files: Vec<SourceFile>) -> UploadSummary {
        if files.is_empty() {
            self.notifier
                .notice(NoticeKind::Warning, "no files selected");
            return UploadSummary::default();
        }
        let summary = upload_batch(
            &self.client,
            &self.transcoder,
            files,
            self.upload_concurrency,
            |event| match event {
                UploadEvent::Skipped { name } => {
                    self.notifier.notice(
                        NoticeKind::Warning,
                        &format!("skipped {name}: base name must be numeric"),
                    );
                }
                UploadEvent::Converting { position, total } => {
                    self.notifier
                        .progress(((position + 1) * 80 / total.max(1)) as u8);
                }
                UploadEvent::ConversionFailed { name } => {
                    self.notifier
                        .notice(NoticeKind::Warning, &format!("could not convert {name}"));
                }
                UploadEvent::Uploaded { completed, total, .. } => {
                    self.notifier
                        .progress((80 + completed * 20 / total.max(1)) as u8);
                }
                UploadEvent::UploadFailed { name, error } => {
                    self.notifier.notice(
                        NoticeKind::Warning,
                        &format!("upload of {name} failed: {error}"),
                    );
                }
            },
        )
        .await;

        let kind = if summary.is_clean() {
            NoticeKind::Info
        } else {
            NoticeKind::Warning
        };
        self.notifier.notice(
            kind,
            &format!(
                "{} sent | {} skipped | {} failed",
                summary.sent, summary.skipped, summary.failed
            ),
        );

        let _ = self.refresh().await;
        summary
    }
}
