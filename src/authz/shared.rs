//! Reloadable handle to the current authorization model
//!
//! Readers take a snapshot (`Arc<AuthzModel>`) and query it without holding
//! any lock; a reload builds a complete new model first and then swaps the
//! pointer. A model that failed to load is never served: the handle denies
//! every request until a later reload succeeds.

use crate::authz::model::AuthzModel;
use crate::authz::types::AccessLevel;
use crate::error::AuthzResult;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

type Slot = Option<Arc<AuthzModel>>;

/// Shared, swappable authorization model
#[derive(Debug)]
pub struct SharedAuthz {
    current: RwLock<Slot>,
}

impl SharedAuthz {
    /// Serve an already loaded model
    pub fn new(model: AuthzModel) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(model))),
        }
    }

    /// A handle that denies everything until the first successful reload
    pub fn failed() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Load rule texts into a new handle
    pub fn load(rules: &str, global_groups: Option<&str>) -> AuthzResult<Self> {
        AuthzModel::load(rules, global_groups).map(Self::new)
    }

    // Lock helpers recover from poisoning; the slot is only ever replaced
    // wholesale, so its content is always consistent.

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.current.read().unwrap_or_else(|poisoned| {
            warn!("authorization model lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.current.write().unwrap_or_else(|poisoned| {
            warn!("authorization model lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// The model currently served, or `None` after a failed load
    pub fn snapshot(&self) -> Option<Arc<AuthzModel>> {
        self.read_slot().clone()
    }

    pub fn is_failed(&self) -> bool {
        self.read_slot().is_none()
    }

    /// Start serving `model`
    pub fn replace(&self, model: AuthzModel) {
        *self.write_slot() = Some(Arc::new(model));
    }

    /// Rebuild the model from rule texts and swap it in.
    ///
    /// On error the previous model is dropped and every check is denied
    /// until a later reload succeeds.
    pub fn reload(&self, rules: &str, global_groups: Option<&str>) -> AuthzResult<()> {
        match AuthzModel::load(rules, global_groups) {
            Ok(model) => {
                self.replace(model);
                info!("Authorization model reloaded");
                Ok(())
            }
            Err(e) => {
                *self.write_slot() = None;
                warn!(error = %e, "Reload failed, denying all access");
                Err(e)
            }
        }
    }

    /// [`AuthzModel::check`] against the current model; always false when
    /// no model is loaded
    pub fn check(
        &self,
        repo: &str,
        path: &str,
        identity: Option<&str>,
        required: AccessLevel,
        recursive: bool,
    ) -> bool {
        self.snapshot()
            .is_some_and(|model| model.check(repo, path, identity, required, recursive))
    }
}
