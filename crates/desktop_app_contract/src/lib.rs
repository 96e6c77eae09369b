//! Shared contract types between the desktop session core and the applications it hosts.
//!
//! The core never renders application content itself. It consumes three narrow contracts:
//! - [`InstanceContent`]: per-tab application state with a JSON serialize/deserialize pair.
//! - [`MountPointProvider`]: supplies (and later detaches) the render target of a window.
//! - [`ContentHost`]: attaches the active instance's content into a window mount.
//!
//! A [`LabelResolver`] supplies localized UI labels. In-memory adapters for each contract are
//! provided for headless hosts and tests.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use serde_json::Value;

/// Stable identifier for a runtime-managed window, as seen by host adapters.
pub type WindowRuntimeId = u64;

/// Application-owned state of one instance (tab) hosted inside a window.
///
/// The shape of the serialized value belongs to the application; the core only stores it.
pub trait InstanceContent {
    /// Returns the committed state of the instance as a JSON-safe value.
    ///
    /// In-flight asynchronous work must not be reflected here.
    fn serialize(&self) -> Value;

    /// Replaces the instance state from a value previously produced by [`Self::serialize`].
    ///
    /// # Errors
    ///
    /// Returns an error when `state` does not match the application's expected shape.
    fn deserialize(&mut self, state: Value) -> Result<(), String>;

    /// Returns a display title derived from the instance state, if the app has one.
    fn title(&self) -> Option<String> {
        None
    }
}

/// Render target handle handed out by a [`MountPointProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountHandle {
    /// Window the container was created for.
    pub window_id: WindowRuntimeId,
    /// DOM id (or equivalent host key) of the container element.
    pub element_id: String,
}

impl MountHandle {
    /// Builds the conventional handle for `window_id`.
    pub fn for_window(window_id: WindowRuntimeId) -> Self {
        Self {
            window_id,
            element_id: window_container_dom_id(window_id),
        }
    }
}

/// Returns the DOM id used for the container element of `window_id`.
pub fn window_container_dom_id(window_id: WindowRuntimeId) -> String {
    format!("desktop-window-{window_id}")
}

/// Supplies render targets for new windows and detaches them on close.
pub trait MountPointProvider {
    /// Creates the container for `window_id`; `None` when the target cannot be created.
    fn create_container(&self, window_id: WindowRuntimeId) -> Option<MountHandle>;

    /// Detaches a previously created container. Late updates into it become no-ops.
    fn detach(&self, handle: &MountHandle);
}

/// Identifier of one attached content tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentMountId(pub u64);

/// Attaches instance content into a window container.
pub trait ContentHost {
    /// Mounts the content tree of `instance_id` into `target` and returns its mount id.
    fn mount(&self, target: &MountHandle, instance_id: u64) -> ContentMountId;

    /// Removes a previously mounted content tree.
    fn unmount(&self, mount: ContentMountId);
}

/// Resolves localized UI labels by key.
pub trait LabelResolver {
    /// Returns the label for `key`, or `None` when the key is unknown.
    fn resolve(&self, key: &str) -> Option<String>;
}

/// Generic JSON-backed instance content.
///
/// Used by hosts whose applications keep their whole state in one JSON document. The title is
/// read from a top-level `"title"` string when present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonInstance {
    state: Value,
}

impl JsonInstance {
    /// Creates content holding `state`.
    pub fn new(state: Value) -> Self {
        Self { state }
    }

    /// Returns the current state.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Replaces the current state.
    pub fn set_state(&mut self, state: Value) {
        self.state = state;
    }
}

impl InstanceContent for JsonInstance {
    fn serialize(&self) -> Value {
        self.state.clone()
    }

    fn deserialize(&mut self, state: Value) -> Result<(), String> {
        match state {
            Value::Object(_) | Value::Null => {
                self.state = state;
                Ok(())
            }
            other => Err(format!("expected object state, found {other}")),
        }
    }

    fn title(&self) -> Option<String> {
        self.state
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.trim().is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory mount provider keyed by window id.
///
/// Window ids listed through [`MemoryMountProvider::refuse`] get no container, which mimics a
/// missing DOM target.
pub struct MemoryMountProvider {
    attached: Rc<RefCell<BTreeSet<WindowRuntimeId>>>,
    refused: Rc<RefCell<BTreeSet<WindowRuntimeId>>>,
    refuse_all: Rc<Cell<bool>>,
    detach_count: Rc<Cell<usize>>,
}

impl MemoryMountProvider {
    /// Makes container creation fail for `window_id`.
    pub fn refuse(&self, window_id: WindowRuntimeId) {
        self.refused.borrow_mut().insert(window_id);
    }

    /// Makes container creation fail (or succeed again) for every window.
    pub fn set_refuse_all(&self, refuse: bool) {
        self.refuse_all.set(refuse);
    }

    /// Returns the ids of windows with an attached container.
    pub fn attached(&self) -> Vec<WindowRuntimeId> {
        self.attached.borrow().iter().copied().collect()
    }

    /// Returns whether `window_id` currently has an attached container.
    pub fn is_attached(&self, window_id: WindowRuntimeId) -> bool {
        self.attached.borrow().contains(&window_id)
    }

    /// Returns how many detach calls were received.
    pub fn detach_count(&self) -> usize {
        self.detach_count.get()
    }
}

impl MountPointProvider for MemoryMountProvider {
    fn create_container(&self, window_id: WindowRuntimeId) -> Option<MountHandle> {
        if self.refuse_all.get() || self.refused.borrow().contains(&window_id) {
            return None;
        }
        self.attached.borrow_mut().insert(window_id);
        Some(MountHandle::for_window(window_id))
    }

    fn detach(&self, handle: &MountHandle) {
        self.detach_count.set(self.detach_count.get() + 1);
        self.attached.borrow_mut().remove(&handle.window_id);
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory content host recording which instance trees are attached to which containers.
pub struct MemoryContentHost {
    next_id: Rc<Cell<u64>>,
    mounted: Rc<RefCell<BTreeMap<ContentMountId, (MountHandle, u64)>>>,
    total_mounts: Rc<Cell<usize>>,
}

impl MemoryContentHost {
    /// Returns the instance ids mounted into the container of `window_id`.
    pub fn mounted_in(&self, window_id: WindowRuntimeId) -> Vec<u64> {
        self.mounted
            .borrow()
            .values()
            .filter(|(target, _)| target.window_id == window_id)
            .map(|(_, instance_id)| *instance_id)
            .collect()
    }

    /// Returns the number of live content trees across all containers.
    pub fn live_mounts(&self) -> usize {
        self.mounted.borrow().len()
    }

    /// Returns how many mount calls were received over the host's lifetime.
    pub fn total_mounts(&self) -> usize {
        self.total_mounts.get()
    }
}

impl ContentHost for MemoryContentHost {
    fn mount(&self, target: &MountHandle, instance_id: u64) -> ContentMountId {
        let id = ContentMountId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.total_mounts.set(self.total_mounts.get() + 1);
        self.mounted
            .borrow_mut()
            .insert(id, (target.clone(), instance_id));
        id
    }

    fn unmount(&self, mount: ContentMountId) {
        self.mounted.borrow_mut().remove(&mount);
    }
}

#[derive(Debug, Clone, Default)]
/// Label resolver backed by a fixed key/label table.
pub struct StaticLabels {
    labels: BTreeMap<String, String>,
}

impl StaticLabels {
    /// Adds (or replaces) a label.
    pub fn with(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(key.into(), label.into());
        self
    }
}

impl LabelResolver for StaticLabels {
    fn resolve(&self, key: &str) -> Option<String> {
        self.labels.get(key).cloned()
    }
}
