//! Window and instance lifecycle plus session persistence for the browser desktop.
//!
//! [`DesktopSession`] owns every open window, each window's ordered instances (tabs), the focus
//! stack, and the persisted session snapshot. Hosts drive it through explicit operations and
//! execute the [`RuntimeEffect`]s it queues; [`components`] wires it into Leptos.

pub mod components;
pub mod config;
pub mod error;
pub mod focus_stack;
pub mod instance;
pub mod instance_manager;
pub mod keyboard;
pub mod migration;
pub mod model;
pub mod persistence;
pub mod runtime;
pub mod tab_strip;
pub mod window_menu;
pub mod window_registry;
pub mod window_types;

pub use components::{
    browser_session, provide_session, use_session, SessionContext, SignalTabStripRenderer,
    TabStrip,
};
pub use config::{LegacyPathRule, SessionConfig, SESSION_CONFIG_KEY};
pub use error::{LifecycleError, SnapshotError};
pub use focus_stack::FocusStack;
pub use instance::Instance;
pub use instance_manager::{ClosedInstance, InstanceEvent, InstanceManager};
pub use keyboard::{KeyChord, ShortcutAction, ShortcutDispatcher};
pub use model::{InstanceId, ModalState, WindowId, WindowKind, SESSION_SCHEMA_VERSION};
pub use persistence::{
    InstanceSnapshot, RestoreReport, SaveDebouncer, SaveMode, SessionPersistence, SessionSnapshot,
    WindowSnapshot,
};
pub use runtime::{DesktopSession, RuntimeEffect};
pub use tab_strip::{
    tab_views, RecordingTabStripRenderer, TabCommand, TabGesture, TabStripController,
    TabStripRenderer, TabView,
};
pub use window_menu::{
    build_window_menu, CloseAllConfirmation, CloseAllScope, WindowMenuEntry, WindowMenuSection,
};
pub use window_registry::{RegistryEvent, Window, WindowRegistry};
pub use window_types::{WindowTypeDescriptor, WindowTypeRegistry};
