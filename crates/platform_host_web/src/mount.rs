//! DOM-backed window mount points.

use desktop_app_contract::{MountHandle, MountPointProvider, WindowRuntimeId};

/// DOM id of the element that window containers are appended to by default.
pub const DEFAULT_DESKTOP_ROOT_ID: &str = "desktop-windows";

#[derive(Debug, Clone)]
/// Creates one `<div>` per window under a desktop root element and removes it on detach.
///
/// Removing the element on close is what turns late writes from still-running app content into
/// no-ops: they target a node that is no longer in the document.
pub struct DomMountProvider {
    root_id: String,
}

impl Default for DomMountProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DESKTOP_ROOT_ID)
    }
}

impl DomMountProvider {
    /// Creates a provider appending containers under the element with id `root_id`.
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
        }
    }

    /// Returns the DOM id of the desktop root element.
    pub fn root_id(&self) -> &str {
        &self.root_id
    }
}

impl MountPointProvider for DomMountProvider {
    fn create_container(&self, window_id: WindowRuntimeId) -> Option<MountHandle> {
        #[cfg(target_arch = "wasm32")]
        {
            let document = web_sys::window()?.document()?;
            let root = document.get_element_by_id(&self.root_id)?;
            let handle = MountHandle::for_window(window_id);
            // A stale container with the same id would receive a second content tree.
            if let Some(stale) = document.get_element_by_id(&handle.element_id) {
                stale.remove();
            }
            let element = document.create_element("div").ok()?;
            element.set_id(&handle.element_id);
            element.set_class_name("desktop-window-mount");
            root.append_child(&element).ok()?;
            Some(handle)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = window_id;
            None
        }
    }

    fn detach(&self, handle: &MountHandle) {
        #[cfg(target_arch = "wasm32")]
        {
            let element = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|document| document.get_element_by_id(&handle.element_id));
            if let Some(element) = element {
                element.remove();
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = handle;
        }
    }
}
