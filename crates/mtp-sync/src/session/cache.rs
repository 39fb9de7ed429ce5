//! Session-scoped cache of the device's object handle list.

use crate::types::ObjectHandle;

/// Object handles in device enumeration order.
///
/// Absent until the first enumeration. After that, creates and deletes issued through the
/// session are mirrored here so the list stays coherent without re-enumerating.
#[derive(Debug, Default)]
pub(super) struct HandleCache {
    handles: Option<Vec<ObjectHandle>>,
}

impl HandleCache {
    pub(super) fn get(&self) -> Option<&[ObjectHandle]> {
        self.handles.as_deref()
    }

    pub(super) fn fill(&mut self, handles: Vec<ObjectHandle>) {
        self.handles = Some(handles);
    }

    /// Appends a newly created handle. No-op until the list has been enumerated once.
    pub(super) fn insert(&mut self, handle: ObjectHandle) {
        if let Some(handles) = self.handles.as_mut()
            && !handles.contains(&handle)
        {
            handles.push(handle);
        }
    }

    pub(super) fn remove(&mut self, handle: ObjectHandle) {
        if let Some(handles) = self.handles.as_mut() {
            handles.retain(|h| *h != handle);
        }
    }

    pub(super) fn clear(&mut self) {
        self.handles = None;
    }
}
