//! Leptos wiring for a [`DesktopSession`]: reactive tab strips, the tab-strip view, and the
//! executor for [`RuntimeEffect`]s.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};
#[cfg(target_arch = "wasm32")]
use std::time::Duration;

use desktop_app_contract::{ContentHost, LabelResolver};
use leptos::*;
use platform_host_web::{DomMountProvider, WebKeyValueStore};

use crate::{
    config::{SessionConfig, SESSION_CONFIG_KEY},
    keyboard::KeyChord,
    model::{InstanceId, WindowId},
    runtime::{DesktopSession, RuntimeEffect},
    tab_strip::{TabGesture, TabStripRenderer, TabView},
    window_menu::CloseAllConfirmation,
    window_types::WindowTypeRegistry,
};

/// `DataTransfer` format carrying the dragged instance id.
pub const TAB_DRAG_FORMAT: &str = "application/x-desktop-tab";

#[derive(Debug, Clone, Copy)]
/// Tab-strip renderer storing view models in a signal so views update reactively.
pub struct SignalTabStripRenderer {
    strips: RwSignal<BTreeMap<WindowId, Vec<TabView>>>,
}

impl SignalTabStripRenderer {
    pub fn new() -> Self {
        Self {
            strips: create_rw_signal(BTreeMap::new()),
        }
    }

    /// Reactive tab list of one window; empty once the window is gone.
    pub fn tabs(&self, window_id: WindowId) -> Signal<Vec<TabView>> {
        let strips = self.strips;
        Signal::derive(move || strips.with(|all| all.get(&window_id).cloned().unwrap_or_default()))
    }

    fn apply(&self, updates: Vec<(WindowId, Option<Vec<TabView>>)>) {
        if updates.is_empty() {
            return;
        }
        self.strips.update(|all| {
            for (window_id, tabs) in updates {
                match tabs {
                    Some(tabs) => {
                        all.insert(window_id, tabs);
                    }
                    None => {
                        all.remove(&window_id);
                    }
                }
            }
        });
    }
}

impl Default for SignalTabStripRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TabStripRenderer for SignalTabStripRenderer {
    fn render(&self, window: WindowId, tabs: &[TabView]) {
        self.apply(vec![(window, Some(tabs.to_vec()))]);
    }

    fn remove(&self, window: WindowId) {
        self.apply(vec![(window, None)]);
    }
}

/// Collects render calls while the session is borrowed; applied to signals afterwards so
/// reactive effects never observe the session mid-update.
#[derive(Default)]
struct BufferedStrips {
    updates: RefCell<Vec<(WindowId, Option<Vec<TabView>>)>>,
}

impl TabStripRenderer for BufferedStrips {
    fn render(&self, window: WindowId, tabs: &[TabView]) {
        self.updates.borrow_mut().push((window, Some(tabs.to_vec())));
    }

    fn remove(&self, window: WindowId) {
        self.updates.borrow_mut().push((window, None));
    }
}

#[derive(Clone, Copy)]
/// Leptos context giving views access to the session.
pub struct SessionContext {
    session: StoredValue<DesktopSession>,
    /// Reactive tab strips of every open window.
    pub strips: SignalTabStripRenderer,
    /// Window that should receive keyboard focus.
    pub focused_window: RwSignal<Option<WindowId>>,
    /// Close-all request awaiting the user's answer.
    pub close_all_prompt: RwSignal<Option<CloseAllConfirmation>>,
}

impl SessionContext {
    /// Runs `operation` against the session, then executes the effects it queued.
    pub fn dispatch<R>(&self, operation: impl FnOnce(&mut DesktopSession) -> R) -> Option<R> {
        let output = self.session.try_update_value(operation);
        self.run_effects();
        output
    }

    /// Reads the session without mutating it.
    pub fn with<R>(&self, read: impl FnOnce(&DesktopSession) -> R) -> Option<R> {
        self.session.try_with_value(read)
    }

    fn run_effects(&self) {
        let Some(effects) = self.session.try_update_value(DesktopSession::drain_effects) else {
            return;
        };
        let mut needs_render = false;
        for effect in effects {
            match effect {
                RuntimeEffect::RenderTabs(_) => needs_render = true,
                RuntimeEffect::ScheduleSave {
                    generation,
                    delay_ms,
                } => self.schedule_save(generation, delay_ms),
                RuntimeEffect::FocusWindow(window_id) => self.focused_window.set(Some(window_id)),
                RuntimeEffect::ConfirmCloseAll(request) => self.close_all_prompt.set(Some(request)),
            }
        }
        if needs_render {
            let buffer = BufferedStrips::default();
            self.session.update_value(|session| {
                session.render(&buffer);
            });
            self.strips.apply(buffer.updates.into_inner());
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn schedule_save(&self, generation: u64, delay_ms: u64) {
        let context = *self;
        if let Err(err) = set_timeout_with_handle(
            move || {
                context.dispatch(|session| session.fire_scheduled_save(generation));
            },
            Duration::from_millis(delay_ms),
        ) {
            logging::warn!("session save timer failed: {err:?}");
        }
    }

    /// Without browser timers the host drives writes through
    /// [`DesktopSession::poll_scheduled_save`].
    #[cfg(not(target_arch = "wasm32"))]
    fn schedule_save(&self, _generation: u64, _delay_ms: u64) {}
}

/// Builds a session over `localStorage` and DOM containers under `#desktop-windows`.
///
/// Configuration overrides are read from [`SESSION_CONFIG_KEY`].
pub fn browser_session(
    types: WindowTypeRegistry,
    content_host: Rc<dyn ContentHost>,
    labels: Rc<dyn LabelResolver>,
) -> DesktopSession {
    let config = SessionConfig::load(&WebKeyValueStore, SESSION_CONFIG_KEY);
    DesktopSession::new(
        config,
        types,
        Rc::new(DomMountProvider::default()),
        content_host,
        Rc::new(WebKeyValueStore),
        labels,
    )
}

/// Boots `session`, provides [`SessionContext`], and installs keyboard and page-unload
/// listeners.
pub fn provide_session(mut session: DesktopSession) -> SessionContext {
    if let Some(report) = session.init() {
        if !report.warnings.is_empty() {
            logging::log!(
                "session restored {} windows with {} warnings",
                report.restored.len(),
                report.warnings.len()
            );
        }
    }
    let context = SessionContext {
        session: store_value(session),
        strips: SignalTabStripRenderer::new(),
        focused_window: create_rw_signal(None),
        close_all_prompt: create_rw_signal(None),
    };
    provide_context(context);
    context.run_effects();

    let shortcut_listener = window_event_listener(ev::keydown, move |ev| {
        if ev.default_prevented() {
            return;
        }
        let chord = KeyChord::from_keyboard_event(&ev);
        if context
            .dispatch(|session| session.handle_key_chord(&chord))
            .unwrap_or(false)
        {
            ev.prevent_default();
            ev.stop_propagation();
        }
    });
    on_cleanup(move || shortcut_listener.remove());

    let unload_listener = window_event_listener(ev::pagehide, move |_| {
        context.dispatch(DesktopSession::flush);
    });
    on_cleanup(move || unload_listener.remove());

    context
}

/// Returns the current [`SessionContext`].
///
/// # Panics
///
/// Panics when called outside a tree set up by [`provide_session`].
pub fn use_session() -> SessionContext {
    expect_context::<SessionContext>()
}

/// Parses the instance id written by a tab's `dragstart` handler.
pub fn parse_drag_payload(raw: &str) -> Option<InstanceId> {
    raw.trim().parse::<u64>().ok().map(InstanceId)
}

fn dragged_instance(ev: &web_sys::DragEvent) -> Option<InstanceId> {
    let raw = ev.data_transfer()?.get_data(TAB_DRAG_FORMAT).ok()?;
    parse_drag_payload(&raw)
}

#[component]
/// Tab strip of one window: select, close, add, and drag-to-reorder tabs.
pub fn TabStrip(window_id: WindowId) -> impl IntoView {
    let session = use_session();
    let tabs = session.strips.tabs(window_id);
    let gesture = move |gesture: TabGesture| {
        session.dispatch(|s| s.handle_tab_gesture(window_id, gesture));
    };

    let drop_at_end = move |ev: web_sys::DragEvent| {
        ev.prevent_default();
        if let Some(dragged) = dragged_instance(&ev) {
            gesture(TabGesture::Drop {
                dragged,
                target: None,
            });
        }
    };

    view! {
        <div
            class="tab-strip"
            role="tablist"
            on:dragover=|ev: web_sys::DragEvent| ev.prevent_default()
            on:drop=drop_at_end
        >
            <For each=move || tabs.get() key=|tab| tab.clone() let:tab>
                {{
                    let id = tab.id;
                    let class = if tab.active { "tab active" } else { "tab" };
                    view! {
                        <div
                            class=class
                            role="tab"
                            aria-selected=tab.active.to_string()
                            draggable="true"
                            on:click=move |_| gesture(TabGesture::Select(id))
                            on:dragstart=move |ev: web_sys::DragEvent| {
                                if let Some(transfer) = ev.data_transfer() {
                                    if let Err(err) = transfer.set_data(TAB_DRAG_FORMAT, &id.0.to_string()) {
                                        logging::warn!("tab drag start failed: {err:?}");
                                    }
                                }
                            }
                            on:drop=move |ev: web_sys::DragEvent| {
                                ev.prevent_default();
                                ev.stop_propagation();
                                if let Some(dragged) = dragged_instance(&ev) {
                                    gesture(TabGesture::Drop {
                                        dragged,
                                        target: Some(id),
                                    });
                                }
                            }
                        >
                            <span class="tab-title">{tab.title.clone()}</span>
                            <button
                                class="tab-close"
                                aria-label="Close tab"
                                on:click=move |ev: web_sys::MouseEvent| {
                                    ev.stop_propagation();
                                    gesture(TabGesture::Close(id));
                                }
                            >
                                "×"
                            </button>
                        </div>
                    }
                }}
            </For>
            <button class="tab-add" aria-label="New tab" on:click=move |_| gesture(TabGesture::Add)>
                "+"
            </button>
        </div>
    }
}
