//! Tab-strip view models, gesture translation, and content-mount synchronization.
//!
//! The controller renders only windows marked dirty by instance events and skips view models
//! identical to the last rendered ones. Content mounting is kept separate from rendering: exactly
//! one content tree per window is attached, for the active instance.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use desktop_app_contract::{ContentHost, LabelResolver};

use crate::{
    instance::Instance,
    instance_manager::InstanceManager,
    model::{InstanceId, WindowId},
    window_registry::{Window, WindowRegistry},
};

/// Label key of the generic tab title used when content supplies none.
pub const UNTITLED_TAB_LABEL_KEY: &str = "tab.untitled";
const UNTITLED_TAB_FALLBACK: &str = "Tab";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabView {
    pub id: InstanceId,
    pub title: String,
    pub active: bool,
}

/// Builds the tab view models of one window in display order.
pub fn tab_views(manager: &InstanceManager, labels: &dyn LabelResolver) -> Vec<TabView> {
    let generic = labels
        .resolve(UNTITLED_TAB_LABEL_KEY)
        .unwrap_or_else(|| UNTITLED_TAB_FALLBACK.to_string());
    let active = manager.active_id();
    manager
        .instances()
        .iter()
        .map(|instance| TabView {
            id: instance.id(),
            title: instance
                .title()
                .unwrap_or_else(|| format!("{generic} {}", instance.id().0)),
            active: Some(instance.id()) == active,
        })
        .collect()
}

/// Minimal render surface for one window's tab strip.
pub trait TabStripRenderer {
    fn render(&self, window: WindowId, tabs: &[TabView]);

    /// Drops any rendered strip of a closed window.
    fn remove(&self, _window: WindowId) {}
}

#[derive(Debug, Clone, Default)]
/// Renderer that records every call, for headless hosts and tests.
pub struct RecordingTabStripRenderer {
    strips: Rc<RefCell<BTreeMap<WindowId, Vec<TabView>>>>,
    renders: Rc<RefCell<Vec<WindowId>>>,
}

impl RecordingTabStripRenderer {
    pub fn strip(&self, window: WindowId) -> Option<Vec<TabView>> {
        self.strips.borrow().get(&window).cloned()
    }

    /// Windows rendered so far, in call order.
    pub fn render_log(&self) -> Vec<WindowId> {
        self.renders.borrow().clone()
    }

    pub fn render_count(&self) -> usize {
        self.renders.borrow().len()
    }
}

impl TabStripRenderer for RecordingTabStripRenderer {
    fn render(&self, window: WindowId, tabs: &[TabView]) {
        self.strips.borrow_mut().insert(window, tabs.to_vec());
        self.renders.borrow_mut().push(window);
    }

    fn remove(&self, window: WindowId) {
        self.strips.borrow_mut().remove(&window);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Pointer gestures raised by a tab strip.
pub enum TabGesture {
    /// The "+" button.
    Add,
    Select(InstanceId),
    Close(InstanceId),
    /// A tab was dropped onto `target` (before it), or past the last tab when `None`.
    Drop {
        dragged: InstanceId,
        target: Option<InstanceId>,
    },
}

impl TabGesture {
    /// Translates the gesture into a command on `window`. Dropping a tab onto itself is a no-op.
    pub fn into_command(self, window: WindowId) -> Option<TabCommand> {
        let command = match self {
            Self::Add => TabCommand::NewInstance { window },
            Self::Select(instance) => TabCommand::Activate { window, instance },
            Self::Close(instance) => TabCommand::Close { window, instance },
            Self::Drop { dragged, target } if target == Some(dragged) => return None,
            Self::Drop { dragged, target } => TabCommand::Move {
                window,
                instance: dragged,
                before: target,
            },
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Instance-level command shared by tab gestures and keyboard shortcuts.
pub enum TabCommand {
    NewInstance {
        window: WindowId,
    },
    Activate {
        window: WindowId,
        instance: InstanceId,
    },
    Close {
        window: WindowId,
        instance: InstanceId,
    },
    Move {
        window: WindowId,
        instance: InstanceId,
        before: Option<InstanceId>,
    },
    /// Cycles the active tab by `delta` positions, wrapping around.
    Cycle {
        window: WindowId,
        delta: isize,
    },
    ActivateIndex {
        window: WindowId,
        index: usize,
    },
}

impl TabCommand {
    pub fn window(&self) -> WindowId {
        match self {
            Self::NewInstance { window }
            | Self::Activate { window, .. }
            | Self::Close { window, .. }
            | Self::Move { window, .. }
            | Self::Cycle { window, .. }
            | Self::ActivateIndex { window, .. } => *window,
        }
    }
}

#[derive(Debug, Default)]
pub struct TabStripController {
    dirty: BTreeSet<WindowId>,
    rendered: BTreeMap<WindowId, Vec<TabView>>,
}

impl TabStripController {
    pub fn mark_dirty(&mut self, window: WindowId) {
        self.dirty.insert(window);
    }

    pub fn is_dirty(&self, window: WindowId) -> bool {
        self.dirty.contains(&window)
    }

    pub fn dirty_windows(&self) -> Vec<WindowId> {
        self.dirty.iter().copied().collect()
    }

    /// Last view models handed to the renderer for `window`.
    pub fn rendered(&self, window: WindowId) -> Option<&[TabView]> {
        self.rendered.get(&window).map(Vec::as_slice)
    }

    /// Renders every dirty window whose view models changed and returns how many were rendered.
    /// Dirty windows that no longer exist are removed from the renderer.
    pub fn render(
        &mut self,
        registry: &WindowRegistry,
        labels: &dyn LabelResolver,
        renderer: &dyn TabStripRenderer,
    ) -> usize {
        let mut rendered = 0;
        for window_id in std::mem::take(&mut self.dirty) {
            let Some(window) = registry.window(window_id) else {
                if self.rendered.remove(&window_id).is_some() {
                    renderer.remove(window_id);
                }
                continue;
            };
            let views = tab_views(window.instances(), labels);
            if self.rendered.get(&window_id) == Some(&views) {
                continue;
            }
            renderer.render(window_id, &views);
            self.rendered.insert(window_id, views);
            rendered += 1;
        }
        rendered
    }

    /// Drops all cached state.
    pub fn clear(&mut self) {
        self.dirty.clear();
        self.rendered.clear();
    }
}

/// Mounts the active instance's content into the window container and unmounts every other
/// instance's content. Returns whether any mount changed.
pub fn sync_content(window: &mut Window, host: &dyn ContentHost) -> bool {
    let target = window.mount().clone();
    let active = window.instances().active_id();
    let mut changed = false;
    for instance in window.instances_mut().instances_mut() {
        let is_active = Some(instance.id()) == active;
        match (is_active, instance.mount()) {
            (true, None) => {
                let mount = host.mount(&target, instance.id().0);
                instance.set_mount(Some(mount));
                changed = true;
            }
            (false, Some(mount)) => {
                host.unmount(mount);
                instance.set_mount(None);
                changed = true;
            }
            _ => {}
        }
    }
    changed
}

/// Unmounts the content of a removed instance.
pub fn release_instance(instance: &mut Instance, host: &dyn ContentHost) {
    if let Some(mount) = instance.mount() {
        host.unmount(mount);
        instance.set_mount(None);
    }
}

/// Unmounts the content of every instance of a removed window.
pub fn release_window(window: &mut Window, host: &dyn ContentHost) {
    for instance in window.instances_mut().instances_mut() {
        release_instance(instance, host);
    }
}
