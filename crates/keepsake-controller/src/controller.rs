//! The save controller state machine.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{OnceCell, OwnedMutexGuard};
use tracing::{debug, error, info};

use keepsake_backend::{BackendError, BackendResult, PersistenceBackend};
use keepsake_store::{ChunkedStore, StoreResult};
use keepsake_types::{Location, SaveMode};

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use crate::events::{LifecycleEvent, LifecycleEvents, Operation};
use crate::hooks::{ControllerHooks, NoOpHooks};
use crate::live::LiveControllers;
use crate::observer::{BroadcastReport, ObserverRegistry};

/// Initialization progress of a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Owns one save slot and serializes every operation on it.
///
/// At most one of initialize/load/save/create/delete runs at a time; waiters
/// are admitted in arrival order. Backend work runs on a spawned task that
/// holds the operation lock, so an operation whose caller stops waiting
/// finishes its backend step before the next operation starts. Memory-side
/// steps scheduled after that backend step are skipped.
///
/// The active store is `None` until the first persistent load or a create,
/// and again after a delete. Reading or writing while it is `None` is a
/// usage error: it is logged and served from a throwaway empty store.
pub struct SaveController {
    backend: Arc<dyn PersistenceBackend>,
    observers: Arc<ObserverRegistry>,
    hooks: Arc<dyn ControllerHooks>,
    live: Option<Arc<LiveControllers>>,
    config: ControllerConfig,
    events: Arc<LifecycleEvents>,
    op_lock: Arc<tokio::sync::Mutex<()>>,
    init: OnceCell<()>,
    state: Mutex<ControllerState>,
    data: RwLock<Option<ChunkedStore>>,
    name: RwLock<String>,
    exists: AtomicBool,
}

/// Builder for [`SaveController`].
pub struct SaveControllerBuilder {
    backend: Arc<dyn PersistenceBackend>,
    observers: Option<Arc<ObserverRegistry>>,
    hooks: Option<Arc<dyn ControllerHooks>>,
    live: Option<Arc<LiveControllers>>,
    config: ControllerConfig,
}

impl SaveControllerBuilder {
    /// Registry whose participants this controller notifies. Defaults to
    /// [`ObserverRegistry::global`].
    pub fn observers(mut self, observers: Arc<ObserverRegistry>) -> Self {
        self.observers = Some(observers);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn ControllerHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Registry the controller joins when initialized.
    pub fn live_registry(mut self, live: Arc<LiveControllers>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Arc<SaveController> {
        Arc::new(SaveController {
            backend: self.backend,
            observers: self.observers.unwrap_or_else(ObserverRegistry::global),
            hooks: self
                .hooks
                .unwrap_or_else(|| Arc::new(NoOpHooks) as Arc<dyn ControllerHooks>),
            live: self.live,
            config: self.config,
            events: Arc::new(LifecycleEvents::new()),
            op_lock: Arc::new(tokio::sync::Mutex::new(())),
            init: OnceCell::new(),
            state: Mutex::new(ControllerState::Uninitialized),
            data: RwLock::new(None),
            name: RwLock::new(String::new()),
            exists: AtomicBool::new(false),
        })
    }
}

/// Holds the operation lock. Releases it and then emits `Saved` on drop.
///
/// The guard is owned so it can move into a spawned backend task; whoever
/// holds it last, caller or task, releases the lock.
struct OpGuard {
    events: Arc<LifecycleEvents>,
    operation: Operation,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.events.emit(LifecycleEvent::Saved(self.operation));
    }
}

/// Marks an initialization attempt. Unless finished, dropping it (on error
/// or cancellation) puts the controller back to `Uninitialized`.
struct InitAttempt<'a> {
    state: &'a Mutex<ControllerState>,
    finished: bool,
}

impl<'a> InitAttempt<'a> {
    fn start(state: &'a Mutex<ControllerState>) -> Self {
        *state.lock().expect("lock poisoned") = ControllerState::Initializing;
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self) {
        *self.state.lock().expect("lock poisoned") = ControllerState::Ready;
        self.finished = true;
    }
}

impl Drop for InitAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.state.lock().expect("lock poisoned") = ControllerState::Uninitialized;
        }
    }
}

impl SaveController {
    pub fn builder(backend: Arc<dyn PersistenceBackend>) -> SaveControllerBuilder {
        SaveControllerBuilder {
            backend,
            observers: None,
            hooks: None,
            live: None,
            config: ControllerConfig::default(),
        }
    }

    /// Controller with default settings and the global observer registry.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Arc<Self> {
        Self::builder(backend).build()
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Display name reported by the backend. Empty before initialization.
    pub fn name(&self) -> String {
        self.name.read().expect("lock poisoned").clone()
    }

    /// Whether the slot exists.
    pub fn exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().expect("lock poisoned")
    }

    /// True until initialization completes and whenever an operation holds
    /// the lock.
    pub fn is_loading(&self) -> bool {
        self.state() != ControllerState::Ready || self.op_lock.try_lock().is_err()
    }

    /// Whether an active store is present.
    pub fn is_loaded(&self) -> bool {
        self.data.read().expect("lock poisoned").is_some()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn events(&self) -> &LifecycleEvents {
        &self.events
    }

    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    // -----------------------------------------------------------------------
    // Data access
    // -----------------------------------------------------------------------

    /// Run `f` against the active store.
    ///
    /// The store stays locked while `f` runs; do not call back into this
    /// controller's data methods from inside `f`.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut ChunkedStore) -> R) -> R {
        let mut data = self.data.write().expect("lock poisoned");
        if let Some(store) = data.as_mut() {
            return f(store);
        }
        drop(data);
        self.report_unloaded();
        f(&mut ChunkedStore::new())
    }

    /// Run `f` against a shared view of the active store.
    pub fn view<R>(&self, f: impl FnOnce(&ChunkedStore) -> R) -> R {
        let data = self.data.read().expect("lock poisoned");
        if let Some(store) = data.as_ref() {
            return f(store);
        }
        drop(data);
        self.report_unloaded();
        f(&ChunkedStore::new())
    }

    /// Read a record, yielding `T::default()` when absent.
    pub fn read<T: DeserializeOwned + Default>(&self, location: &Location) -> StoreResult<T> {
        self.view(|store| store.read(location))
    }

    /// Overlay a record onto `target`. Returns whether a record was present.
    pub fn read_into<T: Serialize + DeserializeOwned>(
        &self,
        location: &Location,
        target: &mut T,
    ) -> StoreResult<bool> {
        self.view(|store| store.read_into(location, target))
    }

    /// Write a record. Returns `false` when the location's chunk is
    /// unassigned and the write was dropped.
    pub fn write<T: Serialize + ?Sized>(
        &self,
        location: &Location,
        value: &T,
    ) -> StoreResult<bool> {
        self.with_data(|store| store.write(location, value))
    }

    /// A copy of the active store.
    pub fn snapshot(&self) -> ChunkedStore {
        self.view(ChunkedStore::clone)
    }

    fn report_unloaded(&self) {
        error!(
            save = %self.name(),
            "save data accessed before load or create; using an empty store"
        );
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Query the backend for the slot's existence and display name, and
    /// join the live registry.
    ///
    /// Only the first successful call does anything. Concurrent callers wait
    /// for the attempt in flight; a failed or abandoned attempt leaves the
    /// controller uninitialized so a later call retries.
    pub async fn initialize(self: &Arc<Self>) -> ControllerResult<()> {
        self.init
            .get_or_try_init(|| async {
                let attempt = InitAttempt::start(&self.state);
                if let Some(live) = &self.live {
                    live.register(self);
                }
                self.run_initialize().await?;
                attempt.finish();
                Ok::<(), ControllerError>(())
            })
            .await?;
        Ok(())
    }

    async fn run_initialize(&self) -> ControllerResult<()> {
        let op = self.begin(Operation::Initialize).await;
        let ((exists, name), _op) = self
            .run_backend(op, |b| async move {
                Ok::<_, BackendError>((b.exists().await?, b.name().await?))
            })
            .await?;
        self.exists.store(exists, Ordering::SeqCst);
        info!(save = %name, exists, "save controller initialized");
        *self.name.write().expect("lock poisoned") = name;
        Ok(())
    }

    /// Load the save.
    ///
    /// The persistent step replaces the active store with the backend's
    /// contents. The memory step runs the `on_load` hook and then notifies
    /// participants. The report is empty when the memory step is skipped.
    pub async fn load(&self, mode: SaveMode) -> ControllerResult<BroadcastReport> {
        let mut op = self.begin(Operation::Load).await;
        if mode.touches_persistent() {
            let (store, guard) = self
                .run_backend(op, |b| async move { b.load().await })
                .await?;
            op = guard;
            debug!(save = %self.name(), chunks = store.len(), "active store replaced");
            *self.data.write().expect("lock poisoned") = Some(store);
        }
        let mut report = BroadcastReport::default();
        if mode.touches_memory() {
            self.hooks
                .on_load(self)
                .map_err(|source| ControllerError::Hook { hook: "on_load", source })?;
            report = self
                .observers
                .broadcast_load(self, self.config.broadcast_policy)?;
        }
        drop(op);
        Ok(report)
    }

    /// Save the save.
    ///
    /// The memory step asks participants to write and then runs the
    /// `on_save` hook. The persistent step hands a snapshot of the active
    /// store to the backend. A failed persistent step leaves the in-memory
    /// writes in place. The report is empty when the memory step is skipped.
    pub async fn save(&self, mode: SaveMode) -> ControllerResult<BroadcastReport> {
        let op = self.begin(Operation::Save).await;
        let mut report = BroadcastReport::default();
        if mode.touches_memory() {
            report = self
                .observers
                .broadcast_save(self, self.config.broadcast_policy)?;
            self.hooks
                .on_save(self)
                .map_err(|source| ControllerError::Hook { hook: "on_save", source })?;
        }
        if mode.touches_persistent() {
            let snapshot = self.snapshot();
            self.run_backend(op, move |b| async move { b.save(&snapshot).await })
                .await?;
            info!(save = %self.name(), "save persisted");
        }
        Ok(report)
    }

    /// Create the slot with an empty store. Does nothing if it exists.
    ///
    /// Participants are not notified; call [`load`](Self::load) with
    /// [`SaveMode::MemoryOnly`] for that.
    pub async fn create(&self) -> ControllerResult<()> {
        let op = self.begin(Operation::Create).await;
        if self.exists() {
            debug!(save = %self.name(), "create skipped; save exists");
            return Ok(());
        }
        let (store, _op) = self
            .run_backend(op, |b| async move { b.create().await })
            .await?;
        self.exists.store(true, Ordering::SeqCst);
        *self.data.write().expect("lock poisoned") = Some(store);
        info!(save = %self.name(), "save created");
        self.hooks
            .on_load(self)
            .map_err(|source| ControllerError::Hook { hook: "on_load", source })
    }

    /// Delete the slot. Does nothing if it does not exist.
    ///
    /// A failing `on_delete` hook aborts the delete with the slot intact.
    pub async fn delete(&self) -> ControllerResult<()> {
        let op = self.begin(Operation::Delete).await;
        if !self.exists() {
            debug!(save = %self.name(), "delete skipped; save does not exist");
            return Ok(());
        }
        self.exists.store(false, Ordering::SeqCst);
        if let Err(source) = self.hooks.on_delete(self) {
            self.exists.store(true, Ordering::SeqCst);
            return Err(ControllerError::Hook { hook: "on_delete", source });
        }
        self.data.write().expect("lock poisoned").take();
        self.run_backend(op, |b| async move { b.delete().await })
            .await?;
        info!(save = %self.name(), "save deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn begin(&self, operation: Operation) -> OpGuard {
        let guard = Arc::clone(&self.op_lock).lock_owned().await;
        self.events.emit(LifecycleEvent::Saving(operation));
        OpGuard {
            events: Arc::clone(&self.events),
            operation,
            guard: Some(guard),
        }
    }

    /// Run one backend call on its own task, together with the operation
    /// lock. The guard comes back when the call succeeds; if the caller is
    /// dropped meanwhile, the task releases the lock once the call is done.
    async fn run_backend<T, F, Fut>(
        &self,
        op: OpGuard,
        call: F,
    ) -> ControllerResult<(T, OpGuard)>
    where
        F: FnOnce(Arc<dyn PersistenceBackend>) -> Fut,
        Fut: Future<Output = BackendResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let operation = op.operation;
        let call = call(Arc::clone(&self.backend));
        let task = tokio::spawn(async move {
            let result = call.await;
            (result, op)
        });
        match task.await {
            Ok((result, op)) => Ok((result?, op)),
            Err(e) => {
                error!(operation = %operation, error = %e, "backend task aborted");
                Err(ControllerError::TaskAborted(operation.to_string()))
            }
        }
    }
}

impl fmt::Debug for SaveController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveController")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("exists", &self.exists())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
