//! The explicit session context owning the window graph and its collaborators.
//!
//! Every mutation drains registry events synchronously and in order, marks affected tab strips
//! dirty, keeps content mounts in sync, and queues [`RuntimeEffect`]s for the host. Stale window
//! and instance references are logged and absorbed so a gesture racing a close never breaks the
//! desktop.

use std::{collections::BTreeMap, rc::Rc};

use desktop_app_contract::{ContentHost, InstanceContent, LabelResolver, MountPointProvider};
use leptos::logging;
use platform_host::{Clock, KeyValueStore, SystemClock};

use crate::{
    config::SessionConfig,
    error::{LifecycleError, SnapshotError},
    keyboard::{KeyChord, ShortcutDispatcher},
    model::{InstanceId, ModalState, WindowId, WindowKind},
    persistence::{RestoreReport, SaveMode, SessionPersistence, SessionSnapshot},
    tab_strip::{
        release_instance, release_window, sync_content, TabCommand, TabGesture, TabStripController,
        TabStripRenderer,
    },
    window_menu::{
        build_window_menu, CloseAllConfirmation, CloseAllScope, WindowMenu, WindowMenuSection,
    },
    window_registry::{RegistryEvent, Window, WindowRegistry},
    window_types::WindowTypeRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Side effects the host executes after a session mutation.
pub enum RuntimeEffect {
    /// The tab strip of a window changed; call [`DesktopSession::render`].
    RenderTabs(WindowId),
    /// Call [`DesktopSession::fire_scheduled_save`] with `generation` after `delay_ms`.
    ScheduleSave { generation: u64, delay_ms: u64 },
    /// Move keyboard focus into the window.
    FocusWindow(WindowId),
    /// Ask the user to confirm a close-all request.
    ConfirmCloseAll(CloseAllConfirmation),
}

pub struct DesktopSession {
    config: SessionConfig,
    types: WindowTypeRegistry,
    mounts: Rc<dyn MountPointProvider>,
    content_host: Rc<dyn ContentHost>,
    store: Rc<dyn KeyValueStore>,
    labels: Rc<dyn LabelResolver>,
    clock: Rc<dyn Clock>,
    registry: WindowRegistry,
    tabs: TabStripController,
    shortcuts: ShortcutDispatcher,
    menu: WindowMenu,
    persistence: SessionPersistence,
    modals: BTreeMap<String, ModalState>,
    effects: Vec<RuntimeEffect>,
    saves_suspended: bool,
    initialized: bool,
}

impl std::fmt::Debug for DesktopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesktopSession")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("modals", &self.modals)
            .field("effects", &self.effects)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl DesktopSession {
    pub fn new(
        config: SessionConfig,
        types: WindowTypeRegistry,
        mounts: Rc<dyn MountPointProvider>,
        content_host: Rc<dyn ContentHost>,
        store: Rc<dyn KeyValueStore>,
        labels: Rc<dyn LabelResolver>,
    ) -> Self {
        Self {
            registry: WindowRegistry::new(config.base_z_index),
            persistence: SessionPersistence::new(config.clone()),
            config,
            types,
            mounts,
            content_host,
            store,
            labels,
            clock: Rc::new(SystemClock),
            tabs: TabStripController::default(),
            shortcuts: ShortcutDispatcher::with_defaults(),
            menu: WindowMenu::default(),
            modals: BTreeMap::new(),
            effects: Vec::new(),
            saves_suspended: false,
            initialized: false,
        }
    }

    /// Replaces the time source used for snapshot timestamps and debounce deadlines.
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Boots the session, restoring the saved graph when configured to.
    ///
    /// Repeated calls are no-ops until [`Self::teardown`].
    pub fn init(&mut self) -> Option<RestoreReport> {
        if self.initialized {
            return None;
        }
        self.initialized = true;
        self.config.restore_on_boot.then(|| self.restore())
    }

    /// Flushes any pending save, then closes every window without scheduling further writes.
    pub fn teardown(&mut self) {
        self.flush();
        self.saves_suspended = true;
        self.clear_graph();
        self.modals.clear();
        self.menu.cancel();
        self.tabs.clear();
        self.effects.clear();
        self.saves_suspended = false;
        self.initialized = false;
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn types(&self) -> &WindowTypeRegistry {
        &self.types
    }

    pub fn shortcuts_mut(&mut self) -> &mut ShortcutDispatcher {
        &mut self.shortcuts
    }

    pub fn modals(&self) -> &BTreeMap<String, ModalState> {
        &self.modals
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn has_pending_save(&self) -> bool {
        self.persistence.debouncer().is_pending()
    }

    /// Opens a window of `kind` with one fresh instance.
    pub fn open_window(&mut self, kind: WindowKind) -> Option<WindowId> {
        let Some(content) = self.types.create_content(kind) else {
            logging::warn!("open window failed: `{kind}` is not registered");
            return None;
        };
        let window_id = match self
            .registry
            .open(kind, self.types.max_instances(kind), self.mounts.as_ref())
        {
            Ok(window_id) => window_id,
            Err(err) => {
                logging::warn!("open window failed: {err}");
                self.commit();
                return None;
            }
        };
        if let Err(err) = self.registry.create_instance(window_id, content) {
            logging::warn!("open window failed: {err}");
            if let Ok(mut window) = self.registry.close(window_id, self.mounts.as_ref()) {
                release_window(&mut window, self.content_host.as_ref());
            }
            self.commit();
            return None;
        }
        self.commit();
        Some(window_id)
    }

    /// Adds a fresh instance to `window_id` and makes it active.
    pub fn new_instance(&mut self, window_id: WindowId) -> Option<InstanceId> {
        let Some(kind) = self.registry.window(window_id).map(Window::kind) else {
            logging::warn!("new instance failed: {window_id} not found");
            return None;
        };
        let content = self.types.create_content(kind)?;
        let created = self.absorb("new instance", |registry| {
            registry.create_instance(window_id, content)
        });
        self.commit();
        created
    }

    /// Adds an instance to the topmost window of `kind`, opening a window when none exists.
    pub fn new_instance_of_kind(&mut self, kind: WindowKind) -> Option<(WindowId, InstanceId)> {
        if let Some(window_id) = self.registry.top_window_of_kind(kind) {
            return self
                .new_instance(window_id)
                .map(|instance_id| (window_id, instance_id));
        }
        let window_id = self.open_window(kind)?;
        let instance_id = self.active_instance(window_id)?;
        Some((window_id, instance_id))
    }

    pub fn active_instance(&self, window_id: WindowId) -> Option<InstanceId> {
        self.registry
            .window(window_id)
            .and_then(|window| window.instances().active_id())
    }

    /// Closes one instance, and its window when it was the last one.
    pub fn close_instance(&mut self, window_id: WindowId, instance_id: InstanceId) -> bool {
        let closed = match self
            .registry
            .close_instance(window_id, instance_id, self.mounts.as_ref())
        {
            Ok(closed) => closed,
            Err(err) => {
                logging::warn!("close instance failed: {err}");
                return false;
            }
        };
        let mut instance = closed.instance;
        release_instance(&mut instance, self.content_host.as_ref());
        if let Some(mut window) = closed.closed_window {
            release_window(&mut window, self.content_host.as_ref());
        }
        self.commit();
        true
    }

    pub fn set_active_instance(&mut self, window_id: WindowId, instance_id: InstanceId) -> bool {
        let changed = self
            .absorb("set active instance", |registry| {
                registry.set_active_instance(window_id, instance_id)
            })
            .unwrap_or(false);
        self.commit();
        changed
    }

    /// Moves `instance_id` before `before`, or to the end when `None`.
    pub fn reorder_instance(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
        before: Option<InstanceId>,
    ) -> bool {
        let changed = self
            .absorb("reorder instance", |registry| {
                registry.reorder_instance(window_id, instance_id, before)
            })
            .unwrap_or(false);
        self.commit();
        changed
    }

    /// Runs `update` on an instance's content and persists the change.
    pub fn update_instance<R>(
        &mut self,
        window_id: WindowId,
        instance_id: InstanceId,
        update: impl FnOnce(&mut dyn InstanceContent) -> R,
    ) -> Option<R> {
        let output = self.absorb("update instance", |registry| {
            registry.update_instance(window_id, instance_id, update)
        });
        self.commit();
        output
    }

    pub fn close_window(&mut self, window_id: WindowId) -> bool {
        match self.registry.close(window_id, self.mounts.as_ref()) {
            Ok(mut window) => {
                release_window(&mut window, self.content_host.as_ref());
                self.commit();
                true
            }
            Err(err) => {
                logging::warn!("close window failed: {err}");
                false
            }
        }
    }

    pub fn bring_to_front(&mut self, window_id: WindowId) -> bool {
        let changed = self
            .absorb("bring to front", |registry| registry.bring_to_front(window_id))
            .unwrap_or(false);
        self.commit();
        changed
    }

    /// Minimizes (`false`) or restores (`true`) a window.
    pub fn set_window_visible(&mut self, window_id: WindowId, visible: bool) -> bool {
        let changed = self
            .absorb("set window visibility", |registry| {
                registry.set_visible(window_id, visible)
            })
            .unwrap_or(false);
        self.commit();
        changed
    }

    /// Closes every window of `kind` (all windows when `None`) and returns how many closed.
    pub fn close_all_windows(&mut self, kind: Option<WindowKind>) -> usize {
        let report = self.registry.close_all(kind, self.mounts.as_ref());
        let closed = report.closed.len();
        for mut window in report.closed {
            release_window(&mut window, self.content_host.as_ref());
        }
        self.commit();
        closed
    }

    /// Shows or hides a non-tabbed overlay. Shown overlays stack above every earlier one.
    pub fn set_modal_visible(&mut self, modal_id: &str, visible: bool) -> bool {
        let current = self.modals.get(modal_id).copied();
        if current.map(|modal| modal.visible) == Some(visible)
            || (current.is_none() && !visible)
        {
            return false;
        }
        let z_index = if visible {
            self.modals
                .values()
                .filter(|modal| modal.visible)
                .map(|modal| modal.z_index.saturating_add(1))
                .max()
                .unwrap_or(self.config.modal_z_index)
        } else {
            current.map_or(self.config.modal_z_index, |modal| modal.z_index)
        };
        self.modals
            .insert(modal_id.to_string(), ModalState { visible, z_index });
        self.schedule_save();
        true
    }

    /// Executes the shortcut bound to `chord`. Returns whether the chord was handled.
    pub fn handle_key_chord(&mut self, chord: &KeyChord) -> bool {
        match self.shortcuts.resolve(chord, &self.registry) {
            Some(command) => {
                self.apply_tab_command(command);
                true
            }
            None => false,
        }
    }

    pub fn handle_tab_gesture(&mut self, window_id: WindowId, gesture: TabGesture) -> bool {
        gesture
            .into_command(window_id)
            .is_some_and(|command| self.apply_tab_command(command))
    }

    pub fn apply_tab_command(&mut self, command: TabCommand) -> bool {
        match command {
            TabCommand::NewInstance { window } => self.new_instance(window).is_some(),
            TabCommand::Activate { window, instance } => self.set_active_instance(window, instance),
            TabCommand::Close { window, instance } => self.close_instance(window, instance),
            TabCommand::Move {
                window,
                instance,
                before,
            } => self.reorder_instance(window, instance, before),
            TabCommand::Cycle { window, delta } => {
                let activated = self
                    .absorb("cycle tabs", |registry| registry.activate_offset(window, delta))
                    .flatten();
                self.commit();
                activated.is_some()
            }
            TabCommand::ActivateIndex { window, index } => {
                let activated = self
                    .absorb("jump to tab", |registry| registry.activate_index(window, index))
                    .flatten();
                self.commit();
                activated.is_some()
            }
        }
    }

    /// Renders dirty tab strips and returns how many were rendered.
    pub fn render(&mut self, renderer: &dyn TabStripRenderer) -> usize {
        self.tabs
            .render(&self.registry, self.labels.as_ref(), renderer)
    }

    /// Captures the current graph without writing it.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.persistence
            .capture(&self.registry, &self.types, &self.modals, self.clock.timestamp_ms())
    }

    /// Persists the session now, or schedules a debounced write.
    pub fn save(&mut self, mode: SaveMode) -> bool {
        match mode {
            SaveMode::Immediate => {
                self.persistence.debouncer_mut().cancel();
                self.write_now()
            }
            SaveMode::Debounced => {
                let generation = self.persistence.debouncer_mut().arm(self.clock.now_ms());
                self.effects.push(RuntimeEffect::ScheduleSave {
                    generation,
                    delay_ms: self.persistence.debouncer().delay_ms(),
                });
                true
            }
        }
    }

    /// Writes immediately when a debounced write is pending.
    pub fn flush(&mut self) -> bool {
        self.persistence.debouncer_mut().cancel() && self.write_now()
    }

    /// Writes when the pending debounced write is due. Used by hosts without timers.
    pub fn poll_scheduled_save(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.persistence.debouncer_mut().poll(now) && self.write_now()
    }

    /// Timer callback for [`RuntimeEffect::ScheduleSave`]. Superseded generations do nothing.
    pub fn fire_scheduled_save(&mut self, generation: u64) -> bool {
        self.persistence.debouncer_mut().fire(generation) && self.write_now()
    }

    /// Replaces the current graph with the saved session.
    ///
    /// Corrupt or newer documents leave an empty desktop and a warning; corrupt ones are also
    /// deleted. Restoring twice in a row yields the same graph.
    pub fn restore(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        self.saves_suspended = true;
        self.persistence.debouncer_mut().cancel();
        self.clear_graph();
        self.modals.clear();

        match self.persistence.load(self.store.as_ref()) {
            Ok(Some(decoded)) => {
                report.migrated_from = Some(decoded.migrated_from);
                for warning in decoded.warnings {
                    report.skipped += 1;
                    report.warn(warning);
                }
                self.persistence.restore_into(
                    &decoded.snapshot,
                    &mut self.registry,
                    &self.types,
                    self.mounts.as_ref(),
                    &mut report,
                );
                self.modals = decoded.snapshot.modal_state;
            }
            Ok(None) => {}
            Err(err) => {
                // Newer documents stay in place for the build that wrote them.
                if matches!(err, SnapshotError::Corrupt(_)) {
                    if let Err(clear_err) = self.persistence.clear(self.store.as_ref()) {
                        logging::warn!("discard corrupt session failed: {clear_err}");
                    }
                }
                report.warn(format!("starting with an empty desktop: {err}"));
            }
        }

        self.commit();
        self.saves_suspended = false;
        report
    }

    /// Sections of the window menu.
    pub fn window_menu(&self) -> Vec<WindowMenuSection> {
        build_window_menu(&self.registry, &self.types, self.labels.as_ref())
    }

    /// Starts a close-all request and queues a confirmation prompt.
    pub fn request_close_all(&mut self, scope: CloseAllScope) -> Option<CloseAllConfirmation> {
        let request = self.menu.request_close_all(scope, &self.registry)?;
        self.effects.push(RuntimeEffect::ConfirmCloseAll(request));
        Some(request)
    }

    /// Executes the pending close-all request. Returns how many windows closed.
    pub fn confirm_close_all(&mut self) -> usize {
        match self.menu.confirm() {
            Some(request) => self.close_all_windows(request.scope.kind()),
            None => 0,
        }
    }

    pub fn cancel_close_all(&mut self) -> bool {
        self.menu.cancel()
    }

    pub fn pending_close_all(&self) -> Option<CloseAllConfirmation> {
        self.menu.pending()
    }

    /// Takes the queued effects in emission order.
    pub fn drain_effects(&mut self) -> Vec<RuntimeEffect> {
        std::mem::take(&mut self.effects)
    }

    fn absorb<T>(
        &mut self,
        operation: &str,
        run: impl FnOnce(&mut WindowRegistry) -> Result<T, LifecycleError>,
    ) -> Option<T> {
        match run(&mut self.registry) {
            Ok(value) => Some(value),
            Err(err) => {
                logging::warn!("{operation} failed: {err}");
                None
            }
        }
    }

    /// Processes registry events of the last mutation.
    fn commit(&mut self) {
        let events = self.registry.drain_events();
        if events.is_empty() {
            return;
        }

        let mut touched = Vec::new();
        for event in &events {
            match *event {
                RegistryEvent::Opened(window)
                | RegistryEvent::Closed(window)
                | RegistryEvent::ContentChanged { window, .. }
                | RegistryEvent::Instance { window, .. } => {
                    if !touched.contains(&window) {
                        touched.push(window);
                    }
                }
                RegistryEvent::FocusChanged(window) => {
                    self.effects.push(RuntimeEffect::FocusWindow(window));
                }
                RegistryEvent::VisibilityChanged { .. } => {}
            }
        }

        for window_id in touched {
            if let Some(window) = self.registry.window_mut(window_id) {
                sync_content(window, self.content_host.as_ref());
            }
            self.tabs.mark_dirty(window_id);
            self.effects.push(RuntimeEffect::RenderTabs(window_id));
        }
        self.schedule_save();
    }

    fn schedule_save(&mut self) {
        if !self.saves_suspended {
            self.save(SaveMode::Debounced);
        }
    }

    fn write_now(&mut self) -> bool {
        let snapshot = self.snapshot();
        match self.persistence.write(self.store.as_ref(), &snapshot) {
            Ok(()) => true,
            Err(err) => {
                logging::warn!("session save failed: {err}");
                false
            }
        }
    }

    /// Closes every window and unmounts its content without touching storage.
    fn clear_graph(&mut self) {
        let report = self.registry.close_all(None, self.mounts.as_ref());
        for mut window in report.closed {
            release_window(&mut window, self.content_host.as_ref());
        }
        for event in self.registry.drain_events() {
            if let RegistryEvent::Closed(window) = event {
                self.tabs.mark_dirty(window);
                self.effects.push(RuntimeEffect::RenderTabs(window));
            }
        }
    }
}
