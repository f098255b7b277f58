//! One participant attached to the shared store.

use std::path::Path;
use std::time::Duration;

use crate::bus::ChangeBus;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::dept::DepartmentMergeView;
use crate::error::Result;
use crate::resource::ResourceStore;
use crate::room::RoomStore;
use crate::settings::Settings;
use crate::staff::StaffRoster;
use crate::storage::{Backend, FileBackend, KeyedStore};
use crate::task::{MirrorPolicy, TaskStore};

/// A store handle plus its change bus. Every accessor returns a cheap view
/// sharing both, so a pulse from one store reaches subscribers registered
/// through any other.
#[derive(Clone)]
pub struct SyncContext {
    store: KeyedStore,
    bus: ChangeBus,
    policy: MirrorPolicy,
}

impl SyncContext {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::from_store(KeyedStore::new(backend))
    }

    pub fn from_store(store: KeyedStore) -> Self {
        let bus = ChangeBus::new(store.clone());
        Self {
            store,
            bus,
            policy: MirrorPolicy::default(),
        }
    }

    /// Open a directory-backed store using the watch and mirror settings in `config`.
    pub fn open_dir(dir: &Path, config: &Config) -> Result<Self> {
        let backend = FileBackend::open(dir)?
            .with_debounce(Duration::from_millis(config.watch.debounce_ms));
        Ok(Self::new(backend).with_mirror_policy(MirrorPolicy::tasks(config.tasks.mirror_legacy)))
    }

    pub fn with_mirror_policy(mut self, policy: MirrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &KeyedStore {
        &self.store
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn tasks(&self) -> TaskStore {
        TaskStore::new(self.store.clone(), self.bus.clone(), self.policy)
    }

    pub fn staff(&self) -> StaffRoster {
        StaffRoster::new(self.store.clone(), self.bus.clone())
    }

    pub fn rooms(&self) -> RoomStore {
        RoomStore::new(self.store.clone(), self.bus.clone())
    }

    pub fn resources(&self) -> ResourceStore {
        ResourceStore::new(self.store.clone(), self.bus.clone())
    }

    pub fn departments(&self) -> DepartmentMergeView {
        DepartmentMergeView::new(self.store.clone(), self.staff(), self.resources())
    }

    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.store.clone(), self.tasks(), self.staff(), self.rooms())
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.store.clone(), self.bus.clone())
    }
}
