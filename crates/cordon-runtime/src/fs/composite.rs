//! Ordered composition of file systems.

use super::{FileSystem, FsError};
use cordon_types::{CanonicalPath, ModuleInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tries member file systems in order and routes reads back to the winner.
///
/// Every successful resolution records which member produced the path;
/// [`get_file`](FileSystem::get_file) consults that record instead of
/// asking every member again.
#[derive(Default)]
pub struct CompositeFileSystem {
    members: Vec<Arc<dyn FileSystem>>,
    path_map: Mutex<HashMap<CanonicalPath, usize>>,
}

impl CompositeFileSystem {
    /// Creates a composite over `members`, tried in the given order.
    #[must_use]
    pub fn new(members: Vec<Arc<dyn FileSystem>>) -> Self {
        Self {
            members,
            path_map: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a member with the lowest priority so far.
    #[must_use]
    pub fn with_member(mut self, member: impl FileSystem + 'static) -> Self {
        self.members.push(Arc::new(member));
        self
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Index of the member that produced `path`, if any.
    #[must_use]
    pub fn member_for(&self, path: &CanonicalPath) -> Option<usize> {
        self.path_map.lock().get(path).copied()
    }
}

impl std::fmt::Debug for CompositeFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeFileSystem")
            .field("members", &self.members.len())
            .field("routed_paths", &self.path_map.lock().len())
            .finish()
    }
}

impl FileSystem for CompositeFileSystem {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        for (index, member) in self.members.iter().enumerate() {
            if let Some(path) = member.resolve_module(base, id) {
                debug!(id, path = %path, member = index, "Resolved module");
                self.path_map.lock().insert(path.clone(), index);
                return Some(path);
            }
        }
        None
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        let index = self
            .member_for(path)
            .ok_or_else(|| FsError::Unrouted(path.clone()))?;
        let member = self
            .members
            .get(index)
            .ok_or_else(|| FsError::Unrouted(path.clone()))?;
        member.get_file(path)
    }
}
