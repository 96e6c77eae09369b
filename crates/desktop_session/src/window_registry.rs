//! Registry of all open windows across every window kind.
//!
//! The registry exclusively owns [`Window`] values, issues window ids, keeps the
//! [`FocusStack`] in sync, and forwards each window's instance events into one ordered event
//! queue.

use std::collections::BTreeMap;

use desktop_app_contract::{InstanceContent, MountHandle, MountPointProvider};
use leptos::logging;

use crate::{
    error::LifecycleError,
    focus_stack::FocusStack,
    instance::Instance,
    instance_manager::{InstanceEvent, InstanceManager},
    model::{InstanceId, WindowId, WindowKind},
};

#[derive(Debug)]
pub struct Window {
    id: WindowId,
    kind: WindowKind,
    instances: InstanceManager,
    mount: MountHandle,
    visible: bool,
}

impl Window {
    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    /// Direct access to the instance manager. Events raised through it are picked up by the
    /// next [`WindowRegistry::drain_events`].
    pub fn instances_mut(&mut self) -> &mut InstanceManager {
        &mut self.instances
    }

    pub fn mount(&self) -> &MountHandle {
        &self.mount
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Ordered change notifications emitted by registry mutations.
pub enum RegistryEvent {
    /// A window was registered and mounted.
    Opened(WindowId),
    /// A window was removed and its mount detached. Emitted exactly once per window.
    Closed(WindowId),
    /// A window became the topmost window.
    FocusChanged(WindowId),
    /// A window was minimized or restored.
    VisibilityChanged {
        /// Affected window.
        window: WindowId,
        /// New visibility.
        visible: bool,
    },
    /// The application state of an instance changed.
    ContentChanged {
        /// Owning window.
        window: WindowId,
        /// Affected instance.
        instance: InstanceId,
    },
    /// An instance-manager event of `window`.
    Instance {
        /// Owning window.
        window: WindowId,
        /// Forwarded event.
        event: InstanceEvent,
    },
}

#[derive(Debug)]
/// Result of [`WindowRegistry::close_instance`].
pub struct InstanceClosed {
    /// The removed instance.
    pub instance: Instance,
    /// The window, when closing the instance emptied and removed it.
    pub closed_window: Option<Window>,
}

#[derive(Debug, Default)]
/// Result of a bulk close.
pub struct CloseAllReport {
    /// Windows that were closed.
    pub closed: Vec<Window>,
    /// Windows whose close failed; the bulk close continued past them.
    pub failed: Vec<(WindowId, LifecycleError)>,
}

#[derive(Debug)]
pub struct WindowRegistry {
    windows: BTreeMap<WindowId, Window>,
    focus: FocusStack,
    next_window_id: u64,
    events: Vec<RegistryEvent>,
}

impl WindowRegistry {
    pub fn new(base_z_index: u32) -> Self {
        Self {
            windows: BTreeMap::new(),
            focus: FocusStack::new(base_z_index),
            next_window_id: 1,
            events: Vec::new(),
        }
    }

    /// Registers a window of `kind` with an empty instance list and puts it on top.
    ///
    /// The caller must add at least one instance; a window whose list empties is removed.
    /// Window ids are consumed even when opening fails, so an id is never handed out twice.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::MissingMount`] when the provider cannot create a container.
    pub fn open(
        &mut self,
        kind: WindowKind,
        max_instances: usize,
        mounts: &dyn MountPointProvider,
    ) -> Result<WindowId, LifecycleError> {
        let id = WindowId(self.next_window_id);
        self.next_window_id = self.next_window_id.saturating_add(1);

        let mount = mounts
            .create_container(id.0)
            .ok_or(LifecycleError::MissingMount { kind })?;
        self.windows.insert(
            id,
            Window {
                id,
                kind,
                instances: InstanceManager::new(kind, max_instances),
                mount,
                visible: true,
            },
        );
        self.focus.push(id);
        self.events.push(RegistryEvent::Opened(id));
        self.events.push(RegistryEvent::FocusChanged(id));
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns not-found or capacity errors from the window or its instance manager.
    pub fn create_instance(
        &mut self,
        window_id: WindowId,
        content: Box<dyn InstanceContent>,
    ) -> Result<InstanceId, LifecycleError> {
        let result = self.window_mut_or_err(window_id)?.instances.create(content);
        self.collect_instance_events(window_id);
        result
    }

    /// # Errors
    ///
    /// Returns not-found, duplicate, or capacity errors.
    pub fn restore_instance(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
        content: Box<dyn InstanceContent>,
    ) -> Result<(), LifecycleError> {
        let result = self
            .window_mut_or_err(window_id)?
            .instances
            .restore(instance_id, content);
        self.collect_instance_events(window_id);
        result
    }

    /// Closes one instance; closes the window (exactly once) when it was the last one.
    ///
    /// # Errors
    ///
    /// Returns not-found errors for stale window or instance ids.
    pub fn close_instance(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
        mounts: &dyn MountPointProvider,
    ) -> Result<InstanceClosed, LifecycleError> {
        let closed = self
            .window_mut_or_err(window_id)?
            .instances
            .close(instance_id)
            .map_err(|err| in_window(err, window_id))?;
        self.collect_instance_events(window_id);

        let closed_window = if closed.emptied {
            Some(self.close(window_id, mounts)?)
        } else {
            None
        };
        Ok(InstanceClosed {
            instance: closed.instance,
            closed_window,
        })
    }

    /// # Errors
    ///
    /// Returns not-found errors for stale window or instance ids.
    pub fn set_active_instance(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
    ) -> Result<bool, LifecycleError> {
        let result = self
            .window_mut_or_err(window_id)?
            .instances
            .set_active(instance_id)
            .map_err(|err| in_window(err, window_id));
        self.collect_instance_events(window_id);
        result
    }

    /// # Errors
    ///
    /// Returns not-found errors for stale window or instance ids.
    pub fn reorder_instance(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
        before: Option<InstanceId>,
    ) -> Result<bool, LifecycleError> {
        let result = self
            .window_mut_or_err(window_id)?
            .instances
            .reorder(instance_id, before)
            .map_err(|err| in_window(err, window_id));
        self.collect_instance_events(window_id);
        result
    }

    /// # Errors
    ///
    /// Returns [`LifecycleError::WindowNotFound`] for a stale window id.
    pub fn activate_offset(
        &mut self,
        window_id: WindowId,
        delta: isize,
    ) -> Result<Option<InstanceId>, LifecycleError> {
        let activated = self
            .window_mut_or_err(window_id)?
            .instances
            .activate_offset(delta);
        self.collect_instance_events(window_id);
        Ok(activated)
    }

    /// # Errors
    ///
    /// Returns [`LifecycleError::WindowNotFound`] for a stale window id.
    pub fn activate_index(
        &mut self,
        window_id: WindowId,
        index: usize,
    ) -> Result<Option<InstanceId>, LifecycleError> {
        let activated = self
            .window_mut_or_err(window_id)?
            .instances
            .activate_index(index);
        self.collect_instance_events(window_id);
        Ok(activated)
    }

    /// Runs `update` against an instance's content. A content change is recorded only when the
    /// serialized state differs afterwards.
    ///
    /// # Errors
    ///
    /// Returns not-found errors for stale window or instance ids.
    pub fn update_instance<R>(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
        update: impl FnOnce(&mut dyn InstanceContent) -> R,
    ) -> Result<R, LifecycleError> {
        let instance = self
            .window_mut_or_err(window_id)?
            .instances
            .get_mut(instance_id)
            .ok_or(LifecycleError::InstanceNotFound {
                window: Some(window_id),
                instance: instance_id,
            })?;
        let before = instance.state();
        let output = update(instance.content_mut());
        if instance.state() != before {
            self.events.push(RegistryEvent::ContentChanged {
                window: window_id,
                instance: instance_id,
            });
        }
        Ok(output)
    }

    /// Moves `window_id` to the top of the focus stack. Returns `Ok(false)` when it already is,
    /// in which case no event is emitted.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::WindowNotFound`] for a stale window id.
    pub fn bring_to_front(&mut self, window_id: WindowId) -> Result<bool, LifecycleError> {
        if !self.windows.contains_key(&window_id) {
            return Err(LifecycleError::WindowNotFound(window_id));
        }
        let changed = self.focus.bring_to_front(window_id);
        if changed {
            self.events.push(RegistryEvent::FocusChanged(window_id));
        }
        Ok(changed)
    }

    /// Minimizes (`false`) or restores (`true`) a window. Restoring also raises it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::WindowNotFound`] for a stale window id.
    pub fn set_visible(&mut self, window_id: WindowId, visible: bool) -> Result<bool, LifecycleError> {
        let window = self.window_mut_or_err(window_id)?;
        if window.visible == visible {
            return Ok(false);
        }
        window.visible = visible;
        self.events.push(RegistryEvent::VisibilityChanged {
            window: window_id,
            visible,
        });
        if visible {
            self.bring_to_front(window_id)?;
        }
        Ok(true)
    }

    /// Removes a window from the registry and focus stack and detaches its mount.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::WindowNotFound`] when the window is already gone.
    pub fn close(
        &mut self,
        window_id: WindowId,
        mounts: &dyn MountPointProvider,
    ) -> Result<Window, LifecycleError> {
        self.collect_instance_events(window_id);
        let window = self
            .windows
            .remove(&window_id)
            .ok_or(LifecycleError::WindowNotFound(window_id))?;

        let was_top = self.focus.top() == Some(window_id);
        self.focus.remove(window_id);
        mounts.detach(&window.mount);
        self.events.push(RegistryEvent::Closed(window_id));
        if was_top {
            if let Some(next) = self.focus.top() {
                self.events.push(RegistryEvent::FocusChanged(next));
            }
        }
        Ok(window)
    }

    /// Closes every window of `kind` (or every window when `None`), continuing past failures.
    pub fn close_all(
        &mut self,
        kind: Option<WindowKind>,
        mounts: &dyn MountPointProvider,
    ) -> CloseAllReport {
        let ids: Vec<WindowId> = self.windows(kind).iter().map(|w| w.id).collect();
        self.close_many(&ids, mounts)
    }

    /// Closes each listed window, logging and skipping ids that fail.
    pub fn close_many(
        &mut self,
        window_ids: &[WindowId],
        mounts: &dyn MountPointProvider,
    ) -> CloseAllReport {
        let mut report = CloseAllReport::default();
        for window_id in window_ids {
            match self.close(*window_id, mounts) {
                Ok(window) => report.closed.push(window),
                Err(err) => {
                    logging::warn!("bulk close skipped {window_id}: {err}");
                    report.failed.push((*window_id, err));
                }
            }
        }
        report
    }

    /// Open windows in opening order, optionally filtered by kind.
    pub fn windows(&self, kind: Option<WindowKind>) -> Vec<&Window> {
        self.windows
            .values()
            .filter(|window| kind.map_or(true, |kind| window.kind == kind))
            .collect()
    }

    pub fn window(&self, window_id: WindowId) -> Option<&Window> {
        self.windows.get(&window_id)
    }

    pub fn window_mut(&mut self, window_id: WindowId) -> Option<&mut Window> {
        self.windows.get_mut(&window_id)
    }

    pub fn contains(&self, window_id: WindowId) -> bool {
        self.windows.contains_key(&window_id)
    }

    /// Topmost visible window.
    pub fn active_window(&self) -> Option<WindowId> {
        self.focus
            .order()
            .iter()
            .rev()
            .copied()
            .find(|id| self.windows.get(id).is_some_and(|window| window.visible))
    }

    /// Topmost window regardless of visibility.
    pub fn top_window(&self) -> Option<WindowId> {
        self.focus.top()
    }

    /// Topmost window of `kind`.
    pub fn top_window_of_kind(&self, kind: WindowKind) -> Option<WindowId> {
        self.focus
            .order()
            .iter()
            .rev()
            .copied()
            .find(|id| self.windows.get(id).is_some_and(|window| window.kind == kind))
    }

    /// Back-to-front window order.
    pub fn focus_order(&self) -> &[WindowId] {
        self.focus.order()
    }

    pub fn z_index(&self, window_id: WindowId) -> Option<u32> {
        self.focus.z_index(window_id)
    }

    pub fn max_z_index(&self) -> Option<u32> {
        self.focus.max_z_index()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Takes all events recorded since the last drain, in mutation order.
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        let ids: Vec<WindowId> = self.windows.keys().copied().collect();
        for window_id in ids {
            self.collect_instance_events(window_id);
        }
        std::mem::take(&mut self.events)
    }

    fn window_mut_or_err(&mut self, window_id: WindowId) -> Result<&mut Window, LifecycleError> {
        self.windows
            .get_mut(&window_id)
            .ok_or(LifecycleError::WindowNotFound(window_id))
    }

    fn collect_instance_events(&mut self, window_id: WindowId) {
        let Some(window) = self.windows.get_mut(&window_id) else {
            return;
        };
        for event in window.instances.drain_events() {
            self.events.push(RegistryEvent::Instance {
                window: window_id,
                event,
            });
        }
    }
}

fn in_window(err: LifecycleError, window_id: WindowId) -> LifecycleError {
    match err {
        LifecycleError::InstanceNotFound { instance, .. } => LifecycleError::InstanceNotFound {
            window: Some(window_id),
            instance,
        },
        other => other,
    }
}
