use crate::controller::SaveController;
use crate::error::ParticipantResult;

/// Controller-level hooks, run alongside the participant broadcasts.
///
/// `on_load` runs after the persistent step of a load (and after a create),
/// before participants are told. `on_save` runs after participants have
/// written, before the snapshot is persisted. `on_delete` runs before the
/// active store is discarded.
pub trait ControllerHooks: Send + Sync {
    fn on_load(&self, _save: &SaveController) -> ParticipantResult {
        Ok(())
    }

    fn on_save(&self, _save: &SaveController) -> ParticipantResult {
        Ok(())
    }

    fn on_delete(&self, _save: &SaveController) -> ParticipantResult {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpHooks;

impl ControllerHooks for NoOpHooks {}
