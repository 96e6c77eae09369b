//! Ordered instance (tab) collection of one window, with its active-instance pointer.
//!
//! Every mutation records an [`InstanceEvent`]; events are drained in mutation order by the
//! owning registry so the tab strip never observes an intermediate state.

use desktop_app_contract::InstanceContent;

use crate::{
    error::LifecycleError,
    instance::Instance,
    model::{InstanceId, WindowKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Change notifications emitted by [`InstanceManager`] mutations.
pub enum InstanceEvent {
    /// An instance was appended.
    Created(InstanceId),
    /// An instance was removed.
    Closed(InstanceId),
    /// The active pointer moved.
    ActiveChanged {
        /// Previously active instance.
        previous: Option<InstanceId>,
        /// Newly active instance.
        current: Option<InstanceId>,
    },
    /// An instance changed position.
    Reordered(InstanceId),
    /// The last instance was closed; the owning window must be removed.
    Emptied,
}

#[derive(Debug)]
/// Result of [`InstanceManager::close`].
pub struct ClosedInstance {
    /// The removed instance, returned so its content mount can be released.
    pub instance: Instance,
    /// Whether the list is now empty.
    pub emptied: bool,
}

#[derive(Debug)]
pub struct InstanceManager {
    kind: WindowKind,
    instances: Vec<Instance>,
    active: Option<InstanceId>,
    next_instance_id: u64,
    max_instances: usize,
    events: Vec<InstanceEvent>,
}

impl InstanceManager {
    /// Creates an empty manager. `max_instances == 0` means unlimited.
    pub fn new(kind: WindowKind, max_instances: usize) -> Self {
        Self {
            kind,
            instances: Vec::new(),
            active: None,
            next_instance_id: 1,
            max_instances,
            events: Vec::new(),
        }
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    /// Appends a new instance with the next sequential id and makes it active.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InstanceLimit`] when a non-zero cap is reached.
    pub fn create(
        &mut self,
        content: Box<dyn InstanceContent>,
    ) -> Result<InstanceId, LifecycleError> {
        self.ensure_capacity()?;
        let id = InstanceId(self.next_instance_id);
        self.next_instance_id = self.next_instance_id.saturating_add(1);
        self.instances.push(Instance::new(id, self.kind, content));
        self.events.push(InstanceEvent::Created(id));
        self.activate(Some(id));
        Ok(id)
    }

    /// Appends an instance under a previously issued id, as recorded in a session snapshot.
    ///
    /// The first restored instance becomes active; later ones do not steal the pointer. The id
    /// counter moves past `id` so it is never issued again.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::DuplicateInstance`] when `id` is already present, or
    /// [`LifecycleError::InstanceLimit`] when the cap is reached.
    pub fn restore(
        &mut self,
        id: InstanceId,
        content: Box<dyn InstanceContent>,
    ) -> Result<(), LifecycleError> {
        if self.position(id).is_some() {
            return Err(LifecycleError::DuplicateInstance(id));
        }
        self.ensure_capacity()?;
        self.next_instance_id = self.next_instance_id.max(id.0.saturating_add(1));
        self.instances.push(Instance::new(id, self.kind, content));
        self.events.push(InstanceEvent::Created(id));
        if self.active.is_none() {
            self.activate(Some(id));
        }
        Ok(())
    }

    /// Removes an instance.
    ///
    /// When the active instance is closed, the instance that shifts into its index becomes
    /// active, or the previous one when the closed instance was last.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InstanceNotFound`] when `id` is absent.
    pub fn close(&mut self, id: InstanceId) -> Result<ClosedInstance, LifecycleError> {
        let index = self.position(id).ok_or_else(|| not_found(id))?;
        let instance = self.instances.remove(index);
        self.events.push(InstanceEvent::Closed(id));

        if self.active == Some(id) {
            let next = self
                .instances
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|prev| self.instances.get(prev)))
                .map(Instance::id);
            self.activate(next);
        }

        let emptied = self.instances.is_empty();
        if emptied {
            self.events.push(InstanceEvent::Emptied);
        }
        Ok(ClosedInstance { instance, emptied })
    }

    /// Moves the active pointer. Returns `Ok(false)` when `id` is already active.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InstanceNotFound`] when `id` is absent.
    pub fn set_active(&mut self, id: InstanceId) -> Result<bool, LifecycleError> {
        if self.position(id).is_none() {
            return Err(not_found(id));
        }
        if self.active == Some(id) {
            return Ok(false);
        }
        self.activate(Some(id));
        Ok(true)
    }

    /// Moves `id` to immediately precede `before`, or to the end when `before` is `None`.
    ///
    /// The active pointer follows identity, so reordering never changes which instance is
    /// active. Returns whether the order changed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InstanceNotFound`] when either id is absent.
    pub fn reorder(
        &mut self,
        id: InstanceId,
        before: Option<InstanceId>,
    ) -> Result<bool, LifecycleError> {
        let from = self.position(id).ok_or_else(|| not_found(id))?;
        let before_index = match before {
            Some(target) => Some(self.position(target).ok_or_else(|| not_found(target))?),
            None => None,
        };
        if before == Some(id) {
            return Ok(false);
        }

        let to = match before_index {
            Some(target) if target > from => target - 1,
            Some(target) => target,
            None => self.instances.len() - 1,
        };
        if to == from {
            return Ok(false);
        }

        let instance = self.instances.remove(from);
        self.instances.insert(to, instance);
        self.events.push(InstanceEvent::Reordered(id));
        Ok(true)
    }

    /// Activates the instance `delta` positions away from the active one, wrapping around.
    pub fn activate_offset(&mut self, delta: isize) -> Option<InstanceId> {
        let len = self.instances.len();
        if len == 0 {
            return None;
        }
        let current = self
            .active
            .and_then(|id| self.position(id))
            .unwrap_or_default();
        let next = (current as isize + delta).rem_euclid(len as isize) as usize;
        let id = self.instances.get(next).map(Instance::id)?;
        self.activate(Some(id));
        Some(id)
    }

    /// Activates the instance at `index` (zero-based), if present.
    pub fn activate_index(&mut self, index: usize) -> Option<InstanceId> {
        let id = self.instances.get(index).map(Instance::id)?;
        self.activate(Some(id));
        Some(id)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.iter().map(Instance::id).collect()
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.iter().find(|instance| instance.id() == id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|instance| instance.id() == id)
    }

    pub fn active(&self) -> Option<&Instance> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_id(&self) -> Option<InstanceId> {
        self.active
    }

    pub fn position(&self, id: InstanceId) -> Option<usize> {
        self.instances.iter().position(|instance| instance.id() == id)
    }

    pub fn count(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub(crate) fn instances_mut(&mut self) -> &mut [Instance] {
        &mut self.instances
    }

    /// Takes the events recorded since the last drain, in mutation order.
    pub fn drain_events(&mut self) -> Vec<InstanceEvent> {
        std::mem::take(&mut self.events)
    }

    fn activate(&mut self, next: Option<InstanceId>) {
        if self.active == next {
            return;
        }
        let previous = self.active;
        self.active = next;
        self.events.push(InstanceEvent::ActiveChanged {
            previous,
            current: next,
        });
    }

    fn ensure_capacity(&self) -> Result<(), LifecycleError> {
        if self.max_instances != 0 && self.instances.len() >= self.max_instances {
            return Err(LifecycleError::InstanceLimit {
                limit: self.max_instances,
            });
        }
        Ok(())
    }
}

fn not_found(instance: InstanceId) -> LifecycleError {
    LifecycleError::InstanceNotFound {
        window: None,
        instance,
    }
}
