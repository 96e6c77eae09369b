//! "Window" menu model: open windows grouped by kind, plus the confirmed close-all flow.

use desktop_app_contract::LabelResolver;

use crate::{
    model::{WindowId, WindowKind},
    window_registry::WindowRegistry,
    window_types::WindowTypeRegistry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMenuEntry {
    pub window: WindowId,
    /// Title of the window's active tab, or the kind label.
    pub title: String,
    pub tab_count: usize,
    /// Whether this is the topmost visible window.
    pub active: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowMenuSection {
    pub kind: WindowKind,
    pub label: String,
    pub entries: Vec<WindowMenuEntry>,
}

/// Lists open windows per kind, in kind order then opening order. Transient kinds and kinds
/// without windows get no section.
pub fn build_window_menu(
    registry: &WindowRegistry,
    types: &WindowTypeRegistry,
    labels: &dyn LabelResolver,
) -> Vec<WindowMenuSection> {
    let active = registry.active_window();
    WindowKind::ALL
        .into_iter()
        .filter(|kind| !types.is_transient(*kind))
        .filter_map(|kind| {
            let label = labels
                .resolve(types.label_key(kind))
                .unwrap_or_else(|| kind.title().to_string());
            let entries: Vec<WindowMenuEntry> = registry
                .windows(Some(kind))
                .into_iter()
                .map(|window| WindowMenuEntry {
                    window: window.id(),
                    title: window
                        .instances()
                        .active()
                        .and_then(|instance| instance.title())
                        .unwrap_or_else(|| label.clone()),
                    tab_count: window.instances().count(),
                    active: Some(window.id()) == active,
                    visible: window.is_visible(),
                })
                .collect();
            (!entries.is_empty()).then_some(WindowMenuSection {
                kind,
                label,
                entries,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAllScope {
    All,
    Kind(WindowKind),
}

impl CloseAllScope {
    pub fn kind(self) -> Option<WindowKind> {
        match self {
            Self::All => None,
            Self::Kind(kind) => Some(kind),
        }
    }
}

/// Pending close-all request awaiting user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseAllConfirmation {
    pub scope: CloseAllScope,
    pub window_count: usize,
}

#[derive(Debug, Default)]
pub struct WindowMenu {
    pending: Option<CloseAllConfirmation>,
}

impl WindowMenu {
    /// Records a close-all request. Returns `None`, leaving nothing pending, when the scope has
    /// no windows.
    pub fn request_close_all(
        &mut self,
        scope: CloseAllScope,
        registry: &WindowRegistry,
    ) -> Option<CloseAllConfirmation> {
        let window_count = registry.windows(scope.kind()).len();
        self.pending = (window_count > 0).then_some(CloseAllConfirmation {
            scope,
            window_count,
        });
        self.pending
    }

    pub fn pending(&self) -> Option<CloseAllConfirmation> {
        self.pending
    }

    /// Takes the pending request for execution.
    pub fn confirm(&mut self) -> Option<CloseAllConfirmation> {
        self.pending.take()
    }

    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}
