//! Registry mapping each [`WindowKind`] to its content factory and persistence policy.

use std::{collections::BTreeMap, rc::Rc};

use desktop_app_contract::{InstanceContent, JsonInstance};
use serde_json::Value;

use crate::model::WindowKind;

/// Builds the default content of a new instance.
pub type ContentFactory = Rc<dyn Fn() -> Box<dyn InstanceContent>>;

#[derive(Clone)]
pub struct WindowTypeDescriptor {
    pub kind: WindowKind,
    /// Label key of the kind's display name.
    pub label_key: String,
    /// Transient kinds are never written to, or restored from, a session snapshot.
    pub transient: bool,
    /// Instance cap per window; `0` means unlimited.
    pub max_instances: usize,
    pub factory: ContentFactory,
}

impl std::fmt::Debug for WindowTypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowTypeDescriptor")
            .field("kind", &self.kind)
            .field("label_key", &self.label_key)
            .field("transient", &self.transient)
            .field("max_instances", &self.max_instances)
            .finish_non_exhaustive()
    }
}

impl WindowTypeDescriptor {
    /// Descriptor whose instances hold a JSON document seeded with `initial_state`.
    pub fn json(kind: WindowKind, initial_state: Value) -> Self {
        Self {
            kind,
            label_key: kind.label_key().to_string(),
            transient: false,
            max_instances: 0,
            factory: Rc::new(move || -> Box<dyn InstanceContent> {
                Box::new(JsonInstance::new(initial_state.clone()))
            }),
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct WindowTypeRegistry {
    descriptors: BTreeMap<WindowKind, WindowTypeDescriptor>,
}

impl WindowTypeRegistry {
    /// Registers every [`WindowKind`] with JSON-backed content. `About` is transient and
    /// single-instance.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(WindowTypeDescriptor::json(
            WindowKind::FileBrowser,
            serde_json::json!({ "path": "/Users/guest" }),
        ));
        registry.register(WindowTypeDescriptor::json(
            WindowKind::Terminal,
            serde_json::json!({ "cwd": "/Users/guest" }),
        ));
        registry.register(WindowTypeDescriptor::json(
            WindowKind::TextEditor,
            serde_json::json!({ "text": "" }),
        ));
        registry.register(WindowTypeDescriptor::json(
            WindowKind::PhotoViewer,
            serde_json::json!({}),
        ));
        registry.register(
            WindowTypeDescriptor::json(WindowKind::About, serde_json::json!({}))
                .transient()
                .with_max_instances(1),
        );
        registry
    }

    /// Registers (or replaces) the descriptor of `descriptor.kind`.
    pub fn register(&mut self, descriptor: WindowTypeDescriptor) {
        self.descriptors.insert(descriptor.kind, descriptor);
    }

    pub fn descriptor(&self, kind: WindowKind) -> Option<&WindowTypeDescriptor> {
        self.descriptors.get(&kind)
    }

    pub fn label_key(&self, kind: WindowKind) -> &str {
        self.descriptor(kind)
            .map_or(kind.label_key(), |d| d.label_key.as_str())
    }

    pub fn is_transient(&self, kind: WindowKind) -> bool {
        self.descriptor(kind).is_some_and(|d| d.transient)
    }

    pub fn max_instances(&self, kind: WindowKind) -> usize {
        self.descriptor(kind).map_or(0, |d| d.max_instances)
    }

    /// Builds fresh content for `kind`, or `None` when the kind is not registered.
    pub fn create_content(&self, kind: WindowKind) -> Option<Box<dyn InstanceContent>> {
        self.descriptor(kind).map(|d| (d.factory)())
    }

    pub fn kinds(&self) -> impl Iterator<Item = WindowKind> + '_ {
        self.descriptors.keys().copied()
    }
}
