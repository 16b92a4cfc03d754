//! The replay catalog: a persisted index over a folder of stored replays.
//!
//! `ReplayCatalog` is the public handle. It is cheap to clone and every clone
//! talks to the same index, username cache and background threads. Ingestion
//! returns as soon as a replay is decoded and stored; missing usernames are
//! filled in later by a single enrichment thread, which announces its progress
//! as `CatalogEvent::Changed`.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use awbw_api::{APIClient, UsernameLookup};
use awbw_config::AwbwConfig;
use awbw_integrations::Log;
use awbw_replay::{ContainerKind, ReplayData, ReplayInfo, ReplayParser};

mod enrichment;
use enrichment::EnrichmentJob;
pub use enrichment::{resolve_usernames, EnrichmentReport, RetryPolicy};

mod errors;
pub use errors::{CatalogError, EnrichmentError, StorageError};

mod events;
pub use events::{CatalogEvent, Subscribers};

mod index;
pub use index::{KnownReplays, UsernameCache, REPLAY_INDEX_FILE, USERNAME_CACHE_FILE};

mod scanner;
pub use scanner::{classify, ScanPlan};

mod storage;
pub use storage::{FolderStorage, MemoryStorage, ReplayStorage};

/// State shared between catalog handles and the background threads.
pub(crate) struct CatalogState {
    pub(crate) storage: Arc<dyn ReplayStorage>,
    pub(crate) parser: ReplayParser,
    pub(crate) replays: KnownReplays,
    pub(crate) usernames: UsernameCache,
    pub(crate) subscribers: Subscribers,
    enrichment: Mutex<Sender<EnrichmentJob>>,
}

impl CatalogState {
    /// Rewrites both snapshots. Failures are logged; the in-memory state stays
    /// authoritative and the next mutation tries again.
    pub(crate) fn persist(&self) {
        if let Err(error) = self.replays.save(self.storage.as_ref()) {
            tracing::error!(target: Log::Catalog, ?error, "Unable to save replay index");
        }

        if let Err(error) = self.usernames.save(self.storage.as_ref()) {
            tracing::error!(target: Log::Catalog, ?error, "Unable to save username cache");
        }
    }

    pub(crate) fn queue_enrichment(&self, replay_id: i64) {
        let sender = self.enrichment.lock().expect("Unable to lock enrichment notifier");

        if let Err(error) = sender.send(EnrichmentJob::Enrich(replay_id)) {
            tracing::error!(
                target: Log::Catalog,
                ?error,
                ?replay_id,
                "Unable to dispatch enrichment request"
            );
        }
    }

    /// Decodes `bytes`, stores them under the replay's id, and indexes the result.
    ///
    /// Nothing is written unless decoding succeeds.
    pub(crate) fn ingest(&self, bytes: &[u8], hint: ContainerKind) -> Result<ReplayInfo, CatalogError> {
        let (data, kind) = self.parser.parse_bytes(bytes, hint)?;

        let mut info = data.info;
        self.usernames.fill(&mut info);

        self.storage.write(&kind.storage_name(info.id), bytes)?;

        // A replay stored in the other container would shadow this one on load.
        let stale = kind.other().storage_name(info.id);
        if self.storage.exists(&stale) {
            self.storage.delete(&stale)?;
        }

        let replaced = self.replays.upsert(info.clone());
        self.persist();

        tracing::info!(target: Log::Catalog, replay_id = info.id, ?replaced, "Ingested replay");

        self.subscribers.notify(match replaced {
            true => CatalogEvent::Changed(info.clone()),
            false => CatalogEvent::Added(info.clone()),
        });

        if info.has_unresolved_usernames() {
            self.queue_enrichment(info.id);
        }

        Ok(info)
    }

    /// Finds the stored artifact for `replay_id`, zip first.
    fn locate(&self, replay_id: i64) -> Option<(String, ContainerKind)> {
        [ContainerKind::Zip, ContainerKind::Compressed]
            .into_iter()
            .map(|kind| (kind.storage_name(replay_id), kind))
            .find(|(name, _)| self.storage.exists(name))
    }
}

/// Owns the enrichment thread. Dropped with the last catalog handle.
struct EnrichmentWorker {
    thread: Option<thread::JoinHandle<()>>,
    notifier: Sender<EnrichmentJob>,
}

impl Drop for EnrichmentWorker {
    /// Asks the enrichment thread to stop and waits for it. A run in progress is
    /// finished first.
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            if let Err(error) = self.notifier.send(EnrichmentJob::Shutdown) {
                tracing::error!(
                    target: Log::Catalog,
                    ?error,
                    "Failed to send shutdown notification to enrichment thread, may hang"
                );
            }

            if let Err(error) = thread.join() {
                tracing::error!(target: Log::Catalog, ?error, "Enrichment thread failure");
            }
        }
    }
}

/// Owns the scan thread, if one was started. Dropping it waits for the scan to
/// finish, so the replays it ingests still reach the enrichment thread.
#[derive(Default)]
struct ScanWorker {
    thread: Option<thread::JoinHandle<()>>,
}

impl ScanWorker {
    fn is_running(&self) -> bool {
        matches!(self.thread.as_ref(), Some(handle) if !handle.is_finished())
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if let Err(error) = thread.join() {
                tracing::error!(target: Log::Catalog, ?error, "Scan thread failure");
            }
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        self.join();
    }
}

/// The public handle to the replay catalog.
#[derive(Clone)]
pub struct ReplayCatalog {
    state: Arc<CatalogState>,
    // Declared before the enrichment worker so the scan is joined first.
    scan: Arc<Mutex<ScanWorker>>,
    _enrichment: Arc<Mutex<EnrichmentWorker>>,
}

impl std::fmt::Debug for ReplayCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayCatalog")
            .field("replays", &self.state.replays)
            .field("usernames", &self.state.usernames)
            .finish_non_exhaustive()
    }
}

impl ReplayCatalog {
    /// Loads the snapshots found in `storage` and starts the enrichment thread.
    ///
    /// No scan is started; call `scan` for that.
    ///
    /// Failure to spawn the enrichment thread is treated as fatal.
    pub fn new(storage: Arc<dyn ReplayStorage>, lookup: Arc<dyn UsernameLookup>, policy: RetryPolicy) -> Self {
        Self::with_parser(storage, lookup, policy, ReplayParser::default())
    }

    /// Like `new`, decoding with `parser` (and so its action registry).
    pub fn with_parser(
        storage: Arc<dyn ReplayStorage>,
        lookup: Arc<dyn UsernameLookup>,
        policy: RetryPolicy,
        parser: ReplayParser,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();

        let state = Arc::new(CatalogState {
            replays: KnownReplays::load(storage.as_ref()),
            usernames: UsernameCache::load(storage.as_ref()),
            storage,
            parser,
            subscribers: Subscribers::default(),
            enrichment: Mutex::new(sender.clone()),
        });

        let worker_state = state.clone();
        let thread = thread::Builder::new()
            .name("ReplayCatalogEnrichmentThread".into())
            .spawn(move || {
                enrichment::run(worker_state, lookup, policy, receiver);
            })
            .expect("Failed to spawn ReplayCatalogEnrichmentThread.");

        let worker = EnrichmentWorker {
            thread: Some(thread),
            notifier: sender,
        };

        Self {
            state,
            scan: Arc::new(Mutex::new(ScanWorker::default())),
            _enrichment: Arc::new(Mutex::new(worker)),
        }
    }

    /// Builds a catalog over the configured replay folder, resolving usernames
    /// against the configured site.
    pub fn from_config(config: &AwbwConfig, app_version: &str) -> Result<Self, CatalogError> {
        let storage = FolderStorage::new(config.replay_folder())?;
        let lookup = APIClient::new(config.api_url(), app_version);

        Ok(Self::new(
            Arc::new(storage),
            Arc::new(lookup),
            RetryPolicy::from_config(config),
        ))
    }

    /// Looks for stored replays the index doesn't know yet and for indexed
    /// replays still missing usernames.
    ///
    /// New replays are decoded on a background thread; their `Added` events
    /// arrive as they finish. Returns `false` without doing anything if a scan
    /// is already running or the store can't be listed.
    pub fn scan(&self) -> bool {
        let mut scan = self.scan.lock().expect("Unable to lock scan thread");

        if scan.is_running() {
            tracing::info!(target: Log::Catalog, "Scan already in progress");
            return false;
        }

        let names = match self.state.storage.list() {
            Ok(names) => names,

            Err(error) => {
                tracing::error!(target: Log::Catalog, ?error, "Unable to list replay store");
                return false;
            },
        };

        let plan = scanner::plan(&self.state, names);

        tracing::info!(
            target: Log::Catalog,
            new = plan.new_files.len(),
            unresolved = plan.needs_enrichment.len(),
            "Scanned replay store"
        );

        for replay_id in plan.needs_enrichment {
            self.state.queue_enrichment(replay_id);
        }

        self.state.persist();

        let state = self.state.clone();
        let new_files = plan.new_files;

        let background_thread = thread::Builder::new()
            .name("ReplayCatalogScanThread".into())
            .spawn(move || {
                scanner::run(state, new_files);
            })
            .expect("Failed to spawn ReplayCatalogScanThread.");

        // Reaps the previous, finished scan.
        scan.join();
        scan.thread = Some(background_thread);
        true
    }

    /// Blocks until the current scan, if any, has ingested everything it found.
    pub fn wait_for_scan(&self) {
        let handle = self.scan.lock().expect("Unable to lock scan thread").thread.take();

        if let Some(handle) = handle {
            if let Err(error) = handle.join() {
                tracing::error!(target: Log::Catalog, ?error, "Scan thread failure");
            }
        }
    }

    /// Ingests a replay file from anywhere on disk. The container is guessed
    /// from the extension.
    pub fn ingest_path(&self, path: &Path) -> Result<ReplayInfo, CatalogError> {
        let bytes = std::fs::read(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.ingest_bytes(&bytes, ContainerKind::from_path(path))
    }

    /// Ingests replay bytes, e.g. straight from a download.
    ///
    /// The replay is indexed (and `Added` or `Changed` fired) before this
    /// returns; unresolved usernames are left to the enrichment thread.
    pub fn ingest_bytes(&self, bytes: &[u8], container: ContainerKind) -> Result<ReplayInfo, CatalogError> {
        self.state.ingest(bytes, container)
    }

    /// Deletes a replay's stored artifact and index entry.
    pub fn remove(&self, replay_id: i64) -> Result<ReplayInfo, CatalogError> {
        let info = self
            .state
            .replays
            .get(replay_id)
            .ok_or(CatalogError::UnknownReplay(replay_id))?;

        while let Some((name, _)) = self.state.locate(replay_id) {
            self.state.storage.delete(&name)?;
        }

        self.state.replays.remove(replay_id);
        self.state.persist();

        tracing::info!(target: Log::Catalog, ?replay_id, "Removed replay");
        self.state.subscribers.notify(CatalogEvent::Removed(info.clone()));

        Ok(info)
    }

    /// Decodes a stored replay in full, with usernames filled from the cache.
    pub fn load_replay(&self, replay_id: i64) -> Result<ReplayData, CatalogError> {
        let (name, kind) = self
            .state
            .locate(replay_id)
            .ok_or(CatalogError::UnknownReplay(replay_id))?;

        let bytes = self.state.storage.read(&name)?;
        let (mut data, _) = self.state.parser.parse_bytes(&bytes, kind)?;

        self.state.usernames.fill_replay(&mut data);

        Ok(data)
    }

    /// Every indexed replay, ordered by id.
    pub fn get_all(&self) -> Vec<ReplayInfo> {
        self.state.replays.all()
    }

    pub fn get_by_id(&self, replay_id: i64) -> Option<ReplayInfo> {
        self.state.replays.get(replay_id)
    }

    /// A channel that receives every event from now on.
    pub fn subscribe(&self) -> Receiver<CatalogEvent> {
        self.state.subscribers.subscribe()
    }

    /// The display name cached for a site user, if any.
    pub fn cached_username(&self, user_id: i64) -> Option<String> {
        self.state.usernames.get(user_id)
    }
}
