//! Session snapshot capture, debounced writes, tolerant decoding, and restore.
//!
//! The whole window/instance graph is written as one JSON document under
//! [`SessionConfig::storage_key`]. Each write replaces the previous document, so a reader never
//! observes a partially written session.

use std::collections::BTreeMap;

use desktop_app_contract::MountPointProvider;
use leptos::logging;
use platform_host::{save_typed_with, KeyValueStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::SessionConfig,
    error::{LifecycleError, SnapshotError},
    migration::migrate_document,
    model::{InstanceId, ModalState, WindowId, WindowKind, SESSION_SCHEMA_VERSION},
    window_registry::WindowRegistry,
    window_types::WindowTypeRegistry,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub instance_id: InstanceId,
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSnapshot {
    /// Window kind token; unknown tokens survive decoding and are reported during restore.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub instances: Vec<InstanceSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_instance_id: Option<InstanceId>,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
}

fn visible_by_default() -> bool {
    true
}

impl WindowSnapshot {
    pub fn window_kind(&self) -> Option<WindowKind> {
        WindowKind::from_token(&self.kind)
    }
}

/// Persisted session document. Windows are listed back-to-front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: u32,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub windows: Vec<WindowSnapshot>,
    #[serde(default)]
    pub modal_state: BTreeMap<String, ModalState>,
}

impl SessionSnapshot {
    pub fn empty(timestamp: u64) -> Self {
        Self {
            version: SESSION_SCHEMA_VERSION,
            timestamp,
            windows: Vec::new(),
            modal_state: BTreeMap::new(),
        }
    }
}

/// Envelope used for tolerant decoding: window and modal records are decoded one by one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    windows: Vec<Value>,
    #[serde(default)]
    modal_state: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSnapshot {
    pub snapshot: SessionSnapshot,
    /// Schema version the document was written with.
    pub migrated_from: u32,
    /// Records dropped while decoding.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Write synchronously, cancelling any scheduled write.
    Immediate,
    /// Schedule a write after the quiet period, superseding any earlier schedule.
    Debounced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSave {
    generation: u64,
    due_at_ms: u64,
}

/// Cancellable single-slot save timer.
///
/// Every arm bumps the generation; a timer callback only fires when it carries the current
/// generation, so superseded timers become no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDebouncer {
    delay_ms: u64,
    generation: u64,
    pending: Option<PendingSave>,
}

impl SaveDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Schedules a write `delay_ms` after `now_ms` and returns its generation.
    pub fn arm(&mut self, now_ms: u64) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(PendingSave {
            generation: self.generation,
            due_at_ms: now_ms.saturating_add(self.delay_ms),
        });
        self.generation
    }

    /// Drops the scheduled write. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.map(|pending| pending.generation)
    }

    pub fn due_at_ms(&self) -> Option<u64> {
        self.pending.map(|pending| pending.due_at_ms)
    }

    /// Consumes the scheduled write when it is due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.pending {
            Some(pending) if now_ms >= pending.due_at_ms => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Consumes the scheduled write when `generation` is still current.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.pending_generation() == Some(generation) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Outcome of a restore. Every skipped record adds a warning.
pub struct RestoreReport {
    /// Restored windows, back-to-front.
    pub restored: Vec<WindowId>,
    pub skipped: usize,
    pub warnings: Vec<String>,
    /// Schema version of the restored document, when one was found.
    pub migrated_from: Option<u32>,
}

impl RestoreReport {
    /// Logs and records a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        logging::warn!("session restore: {message}");
        self.warnings.push(message);
    }

    fn skip(&mut self, message: impl Into<String>) {
        self.skipped += 1;
        self.warn(message);
    }
}

#[derive(Debug)]
pub struct SessionPersistence {
    config: SessionConfig,
    debouncer: SaveDebouncer,
}

impl SessionPersistence {
    pub fn new(config: SessionConfig) -> Self {
        let debouncer = SaveDebouncer::new(config.save_debounce_ms);
        Self { config, debouncer }
    }

    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    pub fn debouncer(&self) -> &SaveDebouncer {
        &self.debouncer
    }

    pub fn debouncer_mut(&mut self) -> &mut SaveDebouncer {
        &mut self.debouncer
    }

    /// Serializes the registry back-to-front, skipping transient window kinds.
    pub fn capture(
        &self,
        registry: &WindowRegistry,
        types: &WindowTypeRegistry,
        modals: &BTreeMap<String, ModalState>,
        timestamp: u64,
    ) -> SessionSnapshot {
        let windows = registry
            .focus_order()
            .iter()
            .filter_map(|id| registry.window(*id))
            .filter(|window| !types.is_transient(window.kind()))
            .map(|window| WindowSnapshot {
                kind: window.kind().token().to_string(),
                instances: window
                    .instances()
                    .instances()
                    .iter()
                    .map(|instance| InstanceSnapshot {
                        instance_id: instance.id(),
                        state: instance.state(),
                    })
                    .collect(),
                active_instance_id: window.instances().active_id(),
                visible: window.is_visible(),
            })
            .collect();

        SessionSnapshot {
            version: SESSION_SCHEMA_VERSION,
            timestamp,
            windows,
            modal_state: modals.clone(),
        }
    }

    /// Replaces the stored document with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] when encoding or the store write fails.
    pub fn write(
        &self,
        store: &dyn KeyValueStore,
        snapshot: &SessionSnapshot,
    ) -> Result<(), SnapshotError> {
        save_typed_with(store, &self.config.storage_key, snapshot).map_err(SnapshotError::Storage)
    }

    /// Loads and decodes the stored document. `Ok(None)` means no session was saved.
    ///
    /// # Errors
    ///
    /// Returns storage, corruption, and version errors; callers treat all of them as "no
    /// session".
    pub fn load(&self, store: &dyn KeyValueStore) -> Result<Option<DecodedSnapshot>, SnapshotError> {
        let Some(raw) = store
            .load(&self.config.storage_key)
            .map_err(SnapshotError::Storage)?
        else {
            return Ok(None);
        };
        self.decode(&raw).map(Some)
    }

    /// Deletes the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] when the store rejects the delete.
    pub fn clear(&self, store: &dyn KeyValueStore) -> Result<(), SnapshotError> {
        store
            .delete(&self.config.storage_key)
            .map_err(SnapshotError::Storage)
    }

    /// Parses, migrates, and decodes a raw document. Malformed window and modal records are
    /// dropped with a warning instead of failing the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Corrupt`] for unparseable documents and
    /// [`SnapshotError::UnsupportedVersion`] for newer schemas.
    pub fn decode(&self, raw: &str) -> Result<DecodedSnapshot, SnapshotError> {
        let mut doc: Value =
            serde_json::from_str(raw).map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
        let migrated_from = migrate_document(&mut doc, &self.config)?;
        let raw: RawSnapshot =
            serde_json::from_value(doc).map_err(|e| SnapshotError::Corrupt(e.to_string()))?;

        let mut warnings = Vec::new();
        let windows = raw
            .windows
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| {
                serde_json::from_value::<WindowSnapshot>(record)
                    .map_err(|err| warnings.push(format!("window record {index} is malformed: {err}")))
                    .ok()
            })
            .collect();
        let modal_state = raw
            .modal_state
            .into_iter()
            .filter_map(|(id, record)| {
                serde_json::from_value::<ModalState>(record)
                    .map_err(|err| warnings.push(format!("modal `{id}` is malformed: {err}")))
                    .ok()
                    .map(|state| (id, state))
            })
            .collect();

        Ok(DecodedSnapshot {
            snapshot: SessionSnapshot {
                version: SESSION_SCHEMA_VERSION,
                timestamp: raw.timestamp,
                windows,
                modal_state,
            },
            migrated_from,
            warnings,
        })
    }

    /// Recreates the windows of `snapshot` in `registry`, which the caller has emptied.
    ///
    /// Windows open in document order, so the focus stack ends up in the saved back-to-front
    /// order. Records that cannot be restored are skipped and reported.
    pub fn restore_into(
        &self,
        snapshot: &SessionSnapshot,
        registry: &mut WindowRegistry,
        types: &WindowTypeRegistry,
        mounts: &dyn MountPointProvider,
        report: &mut RestoreReport,
    ) {
        let limit = self.config.max_restore_windows;
        for (index, record) in snapshot.windows.iter().enumerate() {
            if limit != 0 && report.restored.len() >= limit {
                let dropped = snapshot.windows.len() - index;
                report.skipped += dropped;
                report.warn(format!("restore limit of {limit} windows reached; dropped {dropped}"));
                break;
            }
            match restore_window(record, registry, types, mounts, report) {
                Ok(window_id) => report.restored.push(window_id),
                Err(reason) => report.skip(format!("skipped `{}` window: {reason}", record.kind)),
            }
        }
    }
}

fn restore_window(
    record: &WindowSnapshot,
    registry: &mut WindowRegistry,
    types: &WindowTypeRegistry,
    mounts: &dyn MountPointProvider,
    report: &mut RestoreReport,
) -> Result<WindowId, String> {
    let kind = record
        .window_kind()
        .ok_or_else(|| LifecycleError::UnknownWindowKind(record.kind.clone()).to_string())?;
    if types.is_transient(kind) {
        return Err("transient window kind".to_string());
    }
    if types.descriptor(kind).is_none() {
        return Err("window kind is not registered".to_string());
    }
    if record.instances.is_empty() {
        return Err("no instances".to_string());
    }

    let window_id = registry
        .open(kind, types.max_instances(kind), mounts)
        .map_err(|err| err.to_string())?;

    for saved in &record.instances {
        let Some(mut content) = types.create_content(kind) else {
            continue;
        };
        if let Err(err) = content.deserialize(saved.state.clone()) {
            report.warn(format!(
                "{} of `{kind}` window kept default state: {err}",
                saved.instance_id
            ));
        }
        if let Err(err) = registry.restore_instance(window_id, saved.instance_id, content) {
            report.warn(format!("dropped {} of `{kind}` window: {err}", saved.instance_id));
        }
    }

    let Some(window) = registry.window(window_id) else {
        return Err(LifecycleError::WindowNotFound(window_id).to_string());
    };
    if window.instances().is_empty() {
        // Closing cannot fail here: the window was just looked up.
        let _ = registry.close(window_id, mounts);
        return Err("no restorable instances".to_string());
    }

    if let Some(active) = record.active_instance_id {
        if window.instances().position(active).is_some() {
            registry
                .set_active_instance(window_id, active)
                .map_err(|err| err.to_string())?;
        }
    }
    if !record.visible {
        registry
            .set_visible(window_id, false)
            .map_err(|err| err.to_string())?;
    }
    Ok(window_id)
}

#[cfg(test)]
mod tests {
    use desktop_app_contract::{InstanceContent, JsonInstance, MemoryMountProvider};
    use platform_host::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn persistence() -> SessionPersistence {
        SessionPersistence::new(SessionConfig::default())
    }

    fn content(state: Value) -> Box<dyn InstanceContent> {
        Box::new(JsonInstance::new(state))
    }

    #[test]
    fn debouncer_supersedes_earlier_generations() {
        let mut debouncer = SaveDebouncer::new(400);
        let first = debouncer.arm(1_000);
        let second = debouncer.arm(1_100);
        assert_ne!(first, second);

        assert!(!debouncer.fire(first));
        assert!(!debouncer.poll(1_499));
        assert_eq!(debouncer.due_at_ms(), Some(1_500));
        assert!(debouncer.poll(1_500));
        assert!(!debouncer.fire(second));
        assert!(!debouncer.is_pending());

        let third = debouncer.arm(2_000);
        assert!(debouncer.cancel());
        assert!(!debouncer.fire(third));
    }

    #[test]
    fn capture_writes_focus_order_and_skips_transient_windows() {
        let mounts = MemoryMountProvider::default();
        let types = WindowTypeRegistry::with_defaults();
        let mut registry = WindowRegistry::new(100);

        let editor = registry.open(WindowKind::TextEditor, 0, &mounts).expect("open");
        registry
            .create_instance(editor, content(json!({ "text": "a" })))
            .expect("tab");
        let about = registry.open(WindowKind::About, 1, &mounts).expect("open");
        registry.create_instance(about, content(json!({}))).expect("tab");
        let files = registry.open(WindowKind::FileBrowser, 0, &mounts).expect("open");
        registry
            .create_instance(files, content(json!({ "path": "/Users" })))
            .expect("tab");
        registry.bring_to_front(editor).expect("focus");

        let snapshot = persistence().capture(&registry, &types, &BTreeMap::new(), 42);
        let kinds: Vec<&str> = snapshot.windows.iter().map(|w| w.kind.as_str()).collect();
        assert_eq!(kinds, vec!["file-browser", "text-editor"]);
        assert_eq!(snapshot.timestamp, 42);
        assert_eq!(
            serde_json::to_value(&snapshot.windows[1]).expect("encode"),
            json!({
                "type": "text-editor",
                "instances": [{ "instanceId": 1, "state": { "text": "a" } }],
                "activeInstanceId": 1,
                "visible": true
            })
        );
    }

    #[test]
    fn decode_rejects_corrupt_and_newer_documents() {
        let persistence = persistence();
        assert!(matches!(persistence.decode("{oops"), Err(SnapshotError::Corrupt(_))));
        assert_eq!(
            persistence.decode(r#"{"version": 9, "windows": []}"#),
            Err(SnapshotError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn decode_drops_malformed_records_and_ignores_unknown_fields() {
        let decoded = persistence()
            .decode(
                r#"{
                    "version": 2,
                    "futureField": {"x": 1},
                    "windows": [
                        {"type": "terminal", "instances": [{"instanceId": 4, "state": {"cwd": "/"}}], "extra": true},
                        {"instances": []},
                        "garbage"
                    ],
                    "modalState": {"about": {"visible": true, "zIndex": 10000}, "broken": 7}
                }"#,
            )
            .expect("decode");
        assert_eq!(decoded.snapshot.windows.len(), 1);
        assert_eq!(decoded.snapshot.windows[0].active_instance_id, None);
        assert_eq!(decoded.warnings.len(), 3);
        assert_eq!(
            decoded.snapshot.modal_state.get("about"),
            Some(&ModalState { visible: true, z_index: 10_000 })
        );
    }

    #[test]
    fn load_reports_missing_session_and_storage_errors() {
        let store = MemoryKeyValueStore::default();
        let persistence = persistence();
        assert_eq!(persistence.load(&store), Ok(None));

        persistence
            .write(&store, &SessionSnapshot::empty(1))
            .expect("write");
        let loaded = persistence.load(&store).expect("load").expect("session");
        assert_eq!(loaded.snapshot, SessionSnapshot::empty(1));

        store.set_fail_writes(true);
        assert!(matches!(
            persistence.write(&store, &SessionSnapshot::empty(2)),
            Err(SnapshotError::Storage(_))
        ));
    }

    #[test]
    fn restore_skips_unusable_records_and_keeps_the_rest() {
        let mounts = MemoryMountProvider::default();
        mounts.refuse(1);
        let types = WindowTypeRegistry::with_defaults();
        let mut registry = WindowRegistry::new(100);
        let snapshot: SessionSnapshot = serde_json::from_value(json!({
            "version": 2,
            "windows": [
                { "type": "calculator", "instances": [{ "instanceId": 1 }] },
                { "type": "terminal", "instances": [] },
                { "type": "photo-viewer", "instances": [{ "instanceId": 1 }] },
                { "type": "about", "instances": [{ "instanceId": 1 }] },
                {
                    "type": "text-editor",
                    "instances": [
                        { "instanceId": 2, "state": { "text": "x" } },
                        { "instanceId": 5, "state": [1, 2] }
                    ],
                    "activeInstanceId": 5,
                    "visible": false
                }
            ]
        }))
        .expect("snapshot");

        let mut report = RestoreReport::default();
        persistence().restore_into(&snapshot, &mut registry, &types, &mounts, &mut report);

        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.warnings.len(), 5);

        let window = registry.window(report.restored[0]).expect("editor");
        assert_eq!(window.instances().ids(), vec![InstanceId(2), InstanceId(5)]);
        assert_eq!(window.instances().active_id(), Some(InstanceId(5)));
        assert_eq!(
            window.instances().get(InstanceId(5)).map(|i| i.state()),
            Some(json!({ "text": "" }))
        );
        assert!(!window.is_visible());
    }

    #[test]
    fn restore_honors_window_limit() {
        let mounts = MemoryMountProvider::default();
        let types = WindowTypeRegistry::with_defaults();
        let mut registry = WindowRegistry::new(100);
        let persistence = SessionPersistence::new(SessionConfig {
            max_restore_windows: 1,
            ..SessionConfig::default()
        });
        let record = WindowSnapshot {
            kind: "terminal".to_string(),
            instances: vec![InstanceSnapshot { instance_id: InstanceId(1), state: json!({}) }],
            active_instance_id: None,
            visible: true,
        };
        let snapshot = SessionSnapshot {
            windows: vec![record.clone(), record.clone(), record],
            ..SessionSnapshot::empty(0)
        };

        let mut report = RestoreReport::default();
        persistence.restore_into(&snapshot, &mut registry, &types, &mounts, &mut report);
        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(registry.len(), 1);
    }
}
