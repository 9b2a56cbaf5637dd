//! # Custom Icons and Asynchronous Image Loading
//!
//! Two concerns live here:
//!
//! - **`CustomIconTable`**: the read-mostly table of uploaded icons. The
//!   dispatcher holds it behind an `Arc` and replaces it as a whole value, so a
//!   restyle pass never observes a half-applied upload or delete.
//! - **`IconTasks`**: spawns image loads keyed by `(feature id, classification
//!   generation)`. Each task carries a `CancellationToken`; completions come back
//!   over a channel as [`IconReady`] and are only applied if the feature still
//!   exists with the same generation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::feature::FeatureId;

/// One uploaded icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomIconEntry {
    pub track_group: String,
    /// `None` applies to every subtype of the group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_sub_type: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Snapshot of the uploaded icons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomIconTable {
    entries: Vec<CustomIconEntry>,
}

impl CustomIconTable {
    pub fn new(entries: Vec<CustomIconEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CustomIconEntry] {
        &self.entries
    }

    /// First non-deleted entry for the group whose subtype matches, or that
    /// has no subtype.
    pub fn lookup(&self, track_group: &str, sub_type: Option<&str>) -> Option<&CustomIconEntry> {
        self.entries.iter().find(|entry| {
            !entry.deleted
                && entry.track_group == track_group
                && match entry.track_sub_type.as_deref() {
                    None => true,
                    Some(wanted) => Some(wanted) == sub_type,
                }
        })
    }

    /// Track groups mentioned by any entry, deleted or not.
    pub fn groups(&self) -> HashSet<&str> {
        self.entries.iter().map(|e| e.track_group.as_str()).collect()
    }
}

/// Fetch failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IconError {
    #[error("request for {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("loading {url} timed out after {elapsed:?}")]
    Timeout { url: String, elapsed: Duration },

    #[error("{url} is not available")]
    NotFound { url: String },
}

/// A loaded image, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedIcon {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Fetches icon images. Implementations must not block the caller.
pub trait IconLoader: Send + Sync {
    fn load(&self, url: &str) -> BoxFuture<'static, Result<LoadedIcon, IconError>>;
}

/// Loader that knows no images. Every load fails, so features keep their
/// builtin icon; used when the HTTP loader is compiled out.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIconLoader;

impl IconLoader for NoopIconLoader {
    fn load(&self, url: &str) -> BoxFuture<'static, Result<LoadedIcon, IconError>> {
        let url = url.to_string();
        Box::pin(async move { Err(IconError::NotFound { url }) })
    }
}

/// Icon loader backed by `reqwest`.
#[cfg(feature = "retrieve")]
#[derive(Debug, Clone)]
pub struct HttpIconLoader {
    client: reqwest::Client,
    timeout: Duration,
}

#[cfg(feature = "retrieve")]
impl HttpIconLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[cfg(feature = "retrieve")]
impl IconLoader for HttpIconLoader {
    fn load(&self, url: &str) -> BoxFuture<'static, Result<LoadedIcon, IconError>> {
        let client = self.client.clone();
        let limit = self.timeout;
        let url = url.to_string();
        Box::pin(async move {
            let fetch = async {
                let request_err = |e: reqwest::Error| IconError::Request {
                    url: url.clone(),
                    message: e.to_string(),
                };
                let response = client.get(&url).send().await.map_err(request_err)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(IconError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = response.bytes().await.map_err(request_err)?;
                Ok(LoadedIcon {
                    url: url.clone(),
                    content_type,
                    bytes: bytes.to_vec(),
                })
            };
            match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_) => Err(IconError::Timeout {
                    url: url.clone(),
                    elapsed: limit,
                }),
            }
        })
    }
}

/// Completion of one icon load.
#[derive(Debug, Clone)]
pub struct IconReady {
    pub feature_id: FeatureId,
    pub generation: u64,
    pub url: String,
    pub result: Result<Arc<LoadedIcon>, IconError>,
}

#[derive(Debug)]
struct PendingIcon {
    generation: u64,
    url: String,
    token: CancellationToken,
}

/// Outcome of [`IconTasks::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconRequest {
    /// A load for this key is already in flight.
    Pending,
    /// A new load was spawned.
    Spawned,
    /// The URL failed before; the builtin icon stays.
    KnownFailure,
    /// No async runtime is available to run the load.
    NoRuntime,
}

/// Spawns, tracks and caches icon loads.
pub struct IconTasks {
    loader: Arc<dyn IconLoader>,
    cache: HashMap<String, Arc<LoadedIcon>>,
    failed: HashSet<String>,
    pending: HashMap<FeatureId, PendingIcon>,
    ready_tx: mpsc::UnboundedSender<IconReady>,
}

impl IconTasks {
    /// Creates the task set and the receiver completions arrive on.
    pub fn new(loader: Arc<dyn IconLoader>) -> (Self, mpsc::UnboundedReceiver<IconReady>) {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let tasks = Self {
            loader,
            cache: HashMap::new(),
            failed: HashSet::new(),
            pending: HashMap::new(),
            ready_tx,
        };
        (tasks, ready_rx)
    }

    pub fn cached(&self, url: &str) -> Option<Arc<LoadedIcon>> {
        self.cache.get(url).cloned()
    }

    pub fn is_pending(&self, feature_id: &str) -> bool {
        self.pending.contains_key(feature_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Starts loading `url` for `(feature_id, generation)` unless that exact
    /// load is already running. A load for an older key is cancelled.
    pub fn request(&mut self, feature_id: &str, generation: u64, url: &str) -> IconRequest {
        if let Some(p) = self.pending.get(feature_id) {
            if p.generation == generation && p.url == url {
                return IconRequest::Pending;
            }
        }
        if self.failed.contains(url) {
            self.cancel(feature_id);
            return IconRequest::KnownFailure;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("No async runtime; icon {} for '{}' not loaded", url, feature_id);
                return IconRequest::NoRuntime;
            }
        };
        self.cancel(feature_id);

        let token = CancellationToken::new();
        let task_token = token.clone();
        let load = self.loader.load(url);
        let tx = self.ready_tx.clone();
        let feature = feature_id.to_string();
        let url_owned = url.to_string();
        runtime.spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {
                    log::debug!("Icon load for '{}' (generation {}) cancelled", feature, generation);
                }
                result = load => {
                    let ready = IconReady {
                        feature_id: feature,
                        generation,
                        url: url_owned,
                        result: result.map(Arc::new),
                    };
                    // The engine may have shut down; nothing to apply then.
                    let _ = tx.send(ready);
                }
            }
        });

        self.pending.insert(
            feature_id.to_string(),
            PendingIcon {
                generation,
                url: url.to_string(),
                token,
            },
        );
        IconRequest::Spawned
    }

    /// Cancels the in-flight load for a feature, if any.
    pub fn cancel(&mut self, feature_id: &str) {
        if let Some(p) = self.pending.remove(feature_id) {
            p.token.cancel();
        }
    }

    /// Records a completion. Caches successful images and remembers failures.
    /// Returns `true` when the completion belongs to the current load for the
    /// feature, i.e. the caller may go on and validate it against live state.
    pub fn complete(&mut self, ready: &IconReady) -> bool {
        match &ready.result {
            Ok(image) => {
                self.cache.insert(ready.url.clone(), Arc::clone(image));
            }
            Err(e) => {
                log::warn!("Icon load for '{}' failed: {}", ready.feature_id, e);
                self.failed.insert(ready.url.clone());
            }
        }
        let current = matches!(
            self.pending.get(&ready.feature_id),
            Some(p) if p.generation == ready.generation && p.url == ready.url
        );
        if current {
            self.pending.remove(&ready.feature_id);
        }
        current
    }

    /// Lets previously failed URLs be tried again (after a table swap).
    pub fn forget_failures(&mut self) {
        self.failed.clear();
    }
}
