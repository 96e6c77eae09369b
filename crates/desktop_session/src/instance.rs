//! One independently-stateful view (tab) hosted inside a window.

use desktop_app_contract::{ContentMountId, InstanceContent};
use serde_json::Value;

use crate::model::{InstanceId, WindowKind};

pub struct Instance {
    id: InstanceId,
    kind: WindowKind,
    content: Box<dyn InstanceContent>,
    mount: Option<ContentMountId>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.content.serialize())
            .field("mount", &self.mount)
            .finish()
    }
}

impl Instance {
    pub(crate) fn new(id: InstanceId, kind: WindowKind, content: Box<dyn InstanceContent>) -> Self {
        Self {
            id,
            kind,
            content,
            mount: None,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    /// Serialized application state. The content mount is never part of it.
    pub fn state(&self) -> Value {
        self.content.serialize()
    }

    pub fn title(&self) -> Option<String> {
        self.content.title()
    }

    pub fn content(&self) -> &dyn InstanceContent {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> &mut dyn InstanceContent {
        self.content.as_mut()
    }

    pub fn mount(&self) -> Option<ContentMountId> {
        self.mount
    }

    pub(crate) fn set_mount(&mut self, mount: Option<ContentMountId>) {
        self.mount = mount;
    }
}
