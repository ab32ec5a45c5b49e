//! Tenant-scoped, in-memory caches over the campus REST collections.
//!
//! Each mutation ends with the server's canonical record in local state: `create`
//! appends it, `update` replaces by ID, `remove` drops it after confirmation. Workflows
//! that have server-side side effects follow their write with a full [`ResourceStore::list`].

pub mod resource_store;

pub use resource_store::{ListFilter, ResourceStore, StoreState};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A tenant-scoped document held by a [`ResourceStore`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// REST collection name, e.g. `lost-items`.
    const COLLECTION: &'static str;

    fn id(&self) -> Option<&str>;

    fn set_school_id(&mut self, school_id: &str);
}
