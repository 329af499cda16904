//! Participants and the registry that broadcasts to them.
//!
//! A broadcast copies the participant list before the first callback, so
//! registering or unregistering from inside a callback (including a
//! participant removing itself) affects the next broadcast only.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, Weak};

use tracing::{debug, error, warn};

use crate::config::BroadcastPolicy;
use crate::controller::SaveController;
use crate::error::{ControllerError, ControllerResult, ParticipantResult};

/// Something that keeps state in a save.
///
/// `on_load` is called after data was loaded or created; read your
/// locations through the controller. `on_save` is called before data is
/// persisted; write your locations through the controller.
pub trait Participant: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_load(&self, save: &SaveController) -> ParticipantResult;

    fn on_save(&self, save: &SaveController) -> ParticipantResult;
}

/// Outcome of a broadcast that did not abort.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Participants invoked.
    pub notified: usize,
    /// Names of participants that failed under [`BroadcastPolicy::Isolate`].
    pub failed: Vec<String>,
}

impl BroadcastReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Load,
    Save,
}

/// The set of participants notified by controllers.
///
/// Registration order is most-recent-first: the last participant registered
/// is the first one notified. A participant is identified by its allocation,
/// so the same `Arc` cannot be registered twice.
#[derive(Default)]
pub struct ObserverRegistry {
    participants: RwLock<VecDeque<Arc<dyn Participant>>>,
}

static GLOBAL: OnceLock<Arc<ObserverRegistry>> = OnceLock::new();

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by controllers built without an explicit
    /// one.
    pub fn global() -> Arc<ObserverRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ObserverRegistry::new())))
    }

    /// Register a participant. Returns `false` if it was already registered.
    pub fn register(&self, participant: Arc<dyn Participant>) -> bool {
        let mut participants = self.participants.write().expect("lock poisoned");
        if participants.iter().any(|p| same(p.as_ref(), participant.as_ref())) {
            return false;
        }
        debug!(participant = participant.name(), "participant registered");
        participants.push_front(participant);
        true
    }

    /// Unregister a participant by identity. Returns `false` if it was not
    /// registered.
    ///
    /// Inside a callback a participant can pass `self`.
    pub fn unregister(&self, participant: &dyn Participant) -> bool {
        let mut participants = self.participants.write().expect("lock poisoned");
        let Some(pos) = participants.iter().position(|p| same(p.as_ref(), participant)) else {
            return false;
        };
        participants.remove(pos);
        debug!(participant = participant.name(), "participant unregistered");
        true
    }

    /// Register a participant for as long as the returned guard lives.
    pub fn register_scoped(self: &Arc<Self>, participant: Arc<dyn Participant>) -> Registration {
        self.register_all([participant])
    }

    /// Register several participants under one guard. Participants that were
    /// already registered are left alone and not tracked by the guard.
    pub fn register_all<I>(self: &Arc<Self>, participants: I) -> Registration
    where
        I: IntoIterator<Item = Arc<dyn Participant>>,
    {
        let owned = participants
            .into_iter()
            .filter(|p| self.register(Arc::clone(p)))
            .collect();
        Registration {
            registry: Arc::downgrade(self),
            participants: owned,
        }
    }

    pub fn contains(&self, participant: &dyn Participant) -> bool {
        self.participants
            .read()
            .expect("lock poisoned")
            .iter()
            .any(|p| same(p.as_ref(), participant))
    }

    pub fn len(&self) -> usize {
        self.participants.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration. Returns whether anything was registered.
    ///
    /// Leftover participants usually mean something forgot to unregister,
    /// so a non-empty registry is reported.
    pub fn clear(&self) -> bool {
        let mut participants = self.participants.write().expect("lock poisoned");
        if participants.is_empty() {
            return false;
        }
        let names: Vec<&str> = participants.iter().map(|p| p.name()).collect();
        warn!(
            count = participants.len(),
            participants = ?names,
            "clearing registry with live participants"
        );
        participants.clear();
        true
    }

    /// Tell every participant that data has been loaded.
    pub fn broadcast_load(
        &self,
        save: &SaveController,
        policy: BroadcastPolicy,
    ) -> ControllerResult<BroadcastReport> {
        self.broadcast(save, Phase::Load, policy)
    }

    /// Ask every participant to write its state.
    pub fn broadcast_save(
        &self,
        save: &SaveController,
        policy: BroadcastPolicy,
    ) -> ControllerResult<BroadcastReport> {
        self.broadcast(save, Phase::Save, policy)
    }

    fn broadcast(
        &self,
        save: &SaveController,
        phase: Phase,
        policy: BroadcastPolicy,
    ) -> ControllerResult<BroadcastReport> {
        let snapshot: Vec<Arc<dyn Participant>> = self
            .participants
            .read()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect();

        let mut report = BroadcastReport::default();
        for participant in snapshot {
            let result = match phase {
                Phase::Load => participant.on_load(save),
                Phase::Save => participant.on_save(save),
            };
            report.notified += 1;
            let Err(source) = result else { continue };
            match policy {
                BroadcastPolicy::FailFast => {
                    return Err(ControllerError::Participant {
                        participant: participant.name().to_string(),
                        source,
                    });
                }
                BroadcastPolicy::Isolate => {
                    error!(
                        participant = participant.name(),
                        phase = ?phase,
                        error = %source,
                        "participant failed; continuing broadcast"
                    );
                    report.failed.push(participant.name().to_string());
                }
            }
        }
        Ok(report)
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("participants", &self.len())
            .finish()
    }
}

fn same(a: &dyn Participant, b: &dyn Participant) -> bool {
    std::ptr::eq(
        a as *const dyn Participant as *const (),
        b as *const dyn Participant as *const (),
    )
}

/// Unregisters its participants when dropped.
#[must_use = "dropping a Registration unregisters its participants"]
pub struct Registration {
    registry: Weak<ObserverRegistry>,
    participants: Vec<Arc<dyn Participant>>,
}

impl Registration {
    /// Number of participants this guard will unregister.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        for participant in &self.participants {
            registry.unregister(participant.as_ref());
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("participants", &self.participants.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParticipantError;
    use keepsake_backend::NullBackend;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        tag: &'static str,
        log: Log,
        fail: bool,
    }

    impl Recorder {
        fn new(tag: &'static str, log: &Log) -> Arc<Self> {
            Arc::new(Self { tag, log: Arc::clone(log), fail: false })
        }

        fn failing(tag: &'static str, log: &Log) -> Arc<Self> {
            Arc::new(Self { tag, log: Arc::clone(log), fail: true })
        }

        fn record(&self, phase: &str) -> ParticipantResult {
            self.log.lock().unwrap().push(format!("{}:{phase}", self.tag));
            if self.fail {
                return Err(ParticipantError::Failed(format!("{} broke", self.tag)));
            }
            Ok(())
        }
    }

    impl Participant for Recorder {
        fn name(&self) -> &str {
            self.tag
        }

        fn on_load(&self, _save: &SaveController) -> ParticipantResult {
            self.record("load")
        }

        fn on_save(&self, _save: &SaveController) -> ParticipantResult {
            self.record("save")
        }
    }

    fn controller(registry: &Arc<ObserverRegistry>) -> Arc<SaveController> {
        SaveController::builder(Arc::new(NullBackend::new()))
            .observers(Arc::clone(registry))
            .build()
    }

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ObserverRegistry::new();
        let log = log();
        let p = Recorder::new("p", &log);
        assert!(registry.register(p.clone()));
        assert!(!registry.register(p.clone()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_instances_of_same_type_both_register() {
        let registry = ObserverRegistry::new();
        let log = log();
        assert!(registry.register(Recorder::new("a", &log)));
        assert!(registry.register(Recorder::new("a", &log)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_unknown_is_false() {
        let registry = ObserverRegistry::new();
        let log = log();
        let p = Recorder::new("p", &log);
        assert!(!registry.unregister(&*p));
        registry.register(p.clone());
        assert!(registry.contains(&*p));
        assert!(registry.unregister(&*p));
        assert!(!registry.contains(&*p));
    }

    #[test]
    fn scoped_registration_unregisters_on_drop() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        let p = Recorder::new("p", &log);
        {
            let guard = registry.register_scoped(p.clone());
            assert_eq!(guard.len(), 1);
            assert!(registry.contains(&*p));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn register_all_skips_already_registered() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        let existing = Recorder::new("existing", &log);
        registry.register(existing.clone());

        let batch: Vec<Arc<dyn Participant>> =
            vec![existing.clone(), Recorder::new("fresh", &log)];
        let guard = registry.register_all(batch);
        assert_eq!(guard.len(), 1);
        assert_eq!(registry.len(), 2);

        drop(guard);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&*existing));
    }

    #[test]
    fn guard_outliving_registry_is_harmless() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        let guard = registry.register_scoped(Recorder::new("p", &log));
        drop(registry);
        drop(guard);
    }

    #[test]
    fn clear_reports_leftovers() {
        let registry = ObserverRegistry::new();
        assert!(!registry.clear());
        let log = log();
        registry.register(Recorder::new("p", &log));
        assert!(registry.clear());
        assert!(registry.is_empty());
    }

    // -----------------------------------------------------------------------
    // Broadcasts
    // -----------------------------------------------------------------------

    #[test]
    fn broadcast_is_most_recent_first() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        registry.register(Recorder::new("first", &log));
        registry.register(Recorder::new("second", &log));
        let save = controller(&registry);

        let report = registry
            .broadcast_load(&save, BroadcastPolicy::FailFast)
            .unwrap();
        assert_eq!(report.notified, 2);
        assert!(report.is_clean());
        assert_eq!(*log.lock().unwrap(), vec!["second:load", "first:load"]);
    }

    #[test]
    fn fail_fast_stops_at_first_failure() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        registry.register(Recorder::new("after", &log));
        registry.register(Recorder::failing("bad", &log));
        let save = controller(&registry);

        let err = registry
            .broadcast_save(&save, BroadcastPolicy::FailFast)
            .unwrap_err();
        match err {
            ControllerError::Participant { participant, .. } => assert_eq!(participant, "bad"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*log.lock().unwrap(), vec!["bad:save"]);
    }

    #[test]
    fn isolate_continues_and_reports() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        registry.register(Recorder::new("after", &log));
        registry.register(Recorder::failing("bad", &log));
        let save = controller(&registry);

        let report = registry
            .broadcast_save(&save, BroadcastPolicy::Isolate)
            .unwrap();
        assert_eq!(report.notified, 2);
        assert_eq!(report.failed, vec!["bad"]);
        assert_eq!(*log.lock().unwrap(), vec!["bad:save", "after:save"]);
    }

    struct Registrar {
        registry: Arc<ObserverRegistry>,
        late: Arc<dyn Participant>,
    }

    impl Participant for Registrar {
        fn on_load(&self, _save: &SaveController) -> ParticipantResult {
            self.registry.register(Arc::clone(&self.late));
            Ok(())
        }

        fn on_save(&self, _save: &SaveController) -> ParticipantResult {
            Ok(())
        }
    }

    #[test]
    fn participant_added_mid_broadcast_waits_for_next() {
        let registry = Arc::new(ObserverRegistry::new());
        let log = log();
        let late = Recorder::new("late", &log);
        registry.register(Arc::new(Registrar {
            registry: Arc::clone(&registry),
            late: late.clone(),
        }));
        let save = controller(&registry);

        let first = registry
            .broadcast_load(&save, BroadcastPolicy::FailFast)
            .unwrap();
        assert_eq!(first.notified, 1);
        assert!(log.lock().unwrap().is_empty());

        let second = registry
            .broadcast_load(&save, BroadcastPolicy::FailFast)
            .unwrap();
        assert_eq!(second.notified, 2);
        assert_eq!(*log.lock().unwrap(), vec!["late:load"]);
    }
}
