use std::rc::Rc;

use desktop_app_contract::{MemoryContentHost, MemoryMountProvider, StaticLabels};
use desktop_session::{
    DesktopSession, InstanceId, KeyChord, RecordingTabStripRenderer, SaveMode, SessionConfig,
    TabGesture, WindowId, WindowKind, WindowTypeRegistry,
};
use platform_host::{KeyValueStore, ManualClock, MemoryKeyValueStore};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

const STORAGE_KEY: &str = "desktop.session.v2";

/// One "page load": a fresh session over shared storage, like a browser reload.
struct Page {
    session: DesktopSession,
    mounts: MemoryMountProvider,
    host: MemoryContentHost,
}

fn load_page(store: &MemoryKeyValueStore, clock: &ManualClock) -> Page {
    load_page_with(store, clock, SessionConfig::default())
}

fn load_page_with(store: &MemoryKeyValueStore, clock: &ManualClock, config: SessionConfig) -> Page {
    let mounts = MemoryMountProvider::default();
    let host = MemoryContentHost::default();
    let session = DesktopSession::new(
        config,
        WindowTypeRegistry::with_defaults(),
        Rc::new(mounts.clone()),
        Rc::new(host.clone()),
        Rc::new(store.clone()),
        Rc::new(StaticLabels::default().with("tab.untitled", "Tab")),
    )
    .with_clock(Rc::new(clock.clone()));
    Page {
        session,
        mounts,
        host,
    }
}

fn set_text(page: &mut Page, window: WindowId, instance: InstanceId, text: &str) {
    page.session
        .update_instance(window, instance, |content| {
            content.deserialize(json!({ "text": text, "title": text }))
        })
        .expect("instance exists")
        .expect("valid state");
}

#[test]
fn three_tabs_survive_reload_with_the_second_active() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::starting_at(10_000);

    let mut page = load_page(&store, &clock);
    page.session.init();
    let window = page.session.open_window(WindowKind::TextEditor).expect("open");
    let first = page.session.active_instance(window).expect("first tab");
    let second = page.session.new_instance(window).expect("second tab");
    let third = page.session.new_instance(window).expect("third tab");
    set_text(&mut page, window, first, "a.txt");
    set_text(&mut page, window, second, "b.txt");
    set_text(&mut page, window, third, "c.txt");
    assert!(page.session.set_active_instance(window, second));
    assert!(page.session.flush());

    let mut reloaded = load_page(&store, &clock);
    let report = reloaded.session.init().expect("restored");
    assert_eq!(report.restored.len(), 1);
    assert!(report.warnings.is_empty());

    let restored = reloaded
        .session
        .registry()
        .window(report.restored[0])
        .expect("restored window");
    assert_eq!(restored.kind(), WindowKind::TextEditor);
    assert_eq!(restored.instances().ids(), vec![first, second, third]);
    assert_eq!(restored.instances().active_id(), Some(second));
    let titles: Vec<Option<String>> = restored
        .instances()
        .instances()
        .iter()
        .map(|instance| instance.title())
        .collect();
    assert_eq!(
        titles,
        vec![
            Some("a.txt".to_string()),
            Some("b.txt".to_string()),
            Some("c.txt".to_string())
        ]
    );
}

#[test]
fn closing_the_middle_active_tab_activates_its_right_neighbour() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    let renderer = RecordingTabStripRenderer::default();

    let window = page.session.open_window(WindowKind::FileBrowser).expect("open");
    let a = page.session.active_instance(window).expect("a");
    let b = page.session.new_instance(window).expect("b");
    let c = page.session.new_instance(window).expect("c");
    page.session.set_active_instance(window, b);

    assert!(page.session.handle_tab_gesture(window, TabGesture::Close(b)));
    page.session.render(&renderer);

    let strip = renderer.strip(window).expect("rendered strip");
    let ids: Vec<InstanceId> = strip.iter().map(|tab| tab.id).collect();
    assert_eq!(ids, vec![a, c]);
    assert_eq!(page.session.active_instance(window), Some(c));
    assert!(strip[1].active);
    assert_eq!(page.host.mounted_in(window.0), vec![c.0]);
}

#[test]
fn closing_the_last_tab_removes_the_window_once() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    let renderer = RecordingTabStripRenderer::default();

    let window = page.session.open_window(WindowKind::Terminal).expect("open");
    let only = page.session.active_instance(window).expect("tab");
    page.session.render(&renderer);

    assert!(page.session.close_instance(window, only));
    assert!(!page.session.close_instance(window, only));
    assert!(!page.session.close_window(window));
    page.session.render(&renderer);

    assert!(page.session.registry().is_empty());
    assert_eq!(page.mounts.detach_count(), 1);
    assert_eq!(page.host.live_mounts(), 0);
    assert_eq!(renderer.strip(window), None);
}

#[test]
fn save_then_restore_is_idempotent() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::starting_at(500);
    let mut page = load_page(&store, &clock);

    let editor = page.session.open_window(WindowKind::TextEditor).expect("editor");
    page.session.new_instance(editor).expect("tab");
    let files = page.session.open_window(WindowKind::FileBrowser).expect("files");
    page.session.open_window(WindowKind::About).expect("about");
    page.session.set_window_visible(files, false);
    page.session.bring_to_front(editor);
    page.session.set_modal_visible("about", true);
    assert!(page.session.save(SaveMode::Immediate));
    let saved = page.session.snapshot();

    page.session.restore();
    let once = page.session.snapshot();
    page.session.restore();
    let twice = page.session.snapshot();

    assert_eq!(once, saved);
    assert_eq!(twice, once);
    assert_eq!(page.session.registry().len(), 2);
    assert_eq!(page.mounts.attached().len(), 2);
    assert_eq!(page.host.live_mounts(), 2);
}

#[test]
fn reload_after_flush_mounts_one_content_tree_per_window() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    let window = page.session.open_window(WindowKind::Terminal).expect("open");
    page.session.new_instance(window).expect("tab");
    page.session.new_instance(window).expect("tab");
    assert!(page.session.has_pending_save());

    // Page hide flushes the debounced write before the document goes away.
    assert!(page.session.flush());
    assert_eq!(store.write_count(), 1);

    let mut reloaded = load_page(&store, &clock);
    let report = reloaded.session.init().expect("restored");
    let restored = report.restored[0];
    assert_eq!(reloaded.host.live_mounts(), 1);
    assert_eq!(reloaded.host.mounted_in(restored.0).len(), 1);
    assert_eq!(reloaded.mounts.attached(), vec![restored.0]);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn invalid_window_records_are_skipped_with_a_warning() {
    let store = MemoryKeyValueStore::default();
    store
        .save(
            STORAGE_KEY,
            &json!({
                "version": 2,
                "timestamp": 1,
                "windows": [
                    { "type": "calculator", "instances": [{ "instanceId": 1, "state": {} }] },
                    { "type": "terminal", "instances": [{ "instanceId": 7, "state": { "cwd": "/Users/guest" } }] },
                    { "type": "terminal" }
                ]
            })
            .to_string(),
        )
        .expect("seed store");
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);

    let report = page.session.init().expect("restored");
    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.skipped, 2);
    assert!(report.warnings[0].contains("calculator"));

    let window = report.restored[0];
    let ids = page.session.registry().window(window).expect("terminal").instances().ids();
    assert_eq!(ids, vec![InstanceId(7)]);
    assert_eq!(page.session.new_instance(window), Some(InstanceId(8)));
}

#[test]
fn legacy_documents_are_migrated_on_restore() {
    let store = MemoryKeyValueStore::default();
    store
        .save(
            STORAGE_KEY,
            &json!({
                "version": 1,
                "windows": [
                    { "type": "finder", "state": { "path": "/home/guest/Pictures" } },
                    { "type": "shell", "state": { "cwd": "/home" }, "visible": false }
                ]
            })
            .to_string(),
        )
        .expect("seed store");
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);

    let report = page.session.init().expect("restored");
    assert_eq!(report.migrated_from, Some(1));
    assert_eq!(report.restored.len(), 2);

    let snapshot = page.session.snapshot();
    assert_eq!(snapshot.windows[0].kind, "file-browser");
    assert_eq!(
        snapshot.windows[0].instances[0].state,
        json!({ "path": "/Users/guest/Pictures" })
    );
    assert_eq!(snapshot.windows[1].kind, "terminal");
    assert!(!snapshot.windows[1].visible);
    assert_eq!(page.session.registry().active_window(), Some(report.restored[0]));
}

#[test]
fn current_paths_under_legacy_roots_survive_reload() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    let window = page.session.open_window(WindowKind::FileBrowser).expect("open");
    let instance = page.session.active_instance(window).expect("tab");
    page.session
        .update_instance(window, instance, |content| {
            content.deserialize(json!({ "path": "/home/guest/notes" }))
        })
        .expect("instance exists")
        .expect("valid state");
    assert!(page.session.save(SaveMode::Immediate));

    let mut reloaded = load_page(&store, &clock);
    let report = reloaded.session.init().expect("restored");
    assert_eq!(report.migrated_from, Some(2));
    assert_eq!(
        reloaded.session.snapshot().windows[0].instances[0].state,
        json!({ "path": "/home/guest/notes" })
    );
}

#[test]
fn corrupt_or_newer_documents_start_an_empty_usable_desktop() {
    for (raw, kept) in [
        ("{definitely not json", false),
        (r#"{"version": 99, "windows": []}"#, true),
        ("[]", false),
    ] {
        let store = MemoryKeyValueStore::default();
        store.save(STORAGE_KEY, raw).expect("seed store");
        let clock = ManualClock::default();
        let mut page = load_page(&store, &clock);

        let report = page.session.init().expect("restore attempted");
        assert!(report.restored.is_empty());
        assert_eq!(report.warnings.len(), 1, "{raw}");
        assert_eq!(store.keys().contains(&STORAGE_KEY.to_string()), kept, "{raw}");
        assert!(page.session.open_window(WindowKind::Terminal).is_some());
    }
}

#[test]
fn restore_can_be_disabled() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    page.session.open_window(WindowKind::Terminal).expect("open");
    page.session.save(SaveMode::Immediate);

    let mut reloaded = load_page_with(
        &store,
        &clock,
        SessionConfig {
            restore_on_boot: false,
            ..SessionConfig::default()
        },
    );
    assert_eq!(reloaded.session.init(), None);
    assert!(reloaded.session.registry().is_empty());
}

#[test]
fn reordering_tabs_keeps_the_active_tab() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    let window = page.session.open_window(WindowKind::TextEditor).expect("open");
    let a = page.session.active_instance(window).expect("a");
    let b = page.session.new_instance(window).expect("b");
    let c = page.session.new_instance(window).expect("c");
    page.session.set_active_instance(window, b);

    assert!(page.session.handle_tab_gesture(
        window,
        TabGesture::Drop {
            dragged: c,
            target: Some(a),
        }
    ));
    assert!(page.session.reorder_instance(window, a, None));
    let ids = page
        .session
        .registry()
        .window(window)
        .expect("window")
        .instances()
        .ids();
    assert_eq!(ids, vec![c, b, a]);
    assert_eq!(page.session.active_instance(window), Some(b));
}

#[test]
fn keyboard_shortcuts_drive_the_active_window() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    page.session.open_window(WindowKind::FileBrowser).expect("background");
    let window = page.session.open_window(WindowKind::Terminal).expect("front");
    let chord = |raw: &str| KeyChord::parse(raw).expect("chord");

    assert!(page.session.handle_key_chord(&chord("Alt+T")));
    assert!(page.session.handle_key_chord(&chord("Alt+T")));
    let ids = page.session.registry().window(window).expect("window").instances().ids();
    assert_eq!(ids.len(), 3);

    assert!(page.session.handle_key_chord(&chord("Alt+1")));
    assert_eq!(page.session.active_instance(window), Some(ids[0]));
    assert!(page.session.handle_key_chord(&chord("Ctrl+Shift+Tab")));
    assert_eq!(page.session.active_instance(window), Some(ids[2]));
    assert!(page.session.handle_key_chord(&chord("Alt+W")));
    assert_eq!(
        page.session.registry().window(window).expect("window").instances().count(),
        2
    );
    assert!(!page.session.handle_key_chord(&chord("Ctrl+Q")));
}

#[test]
fn z_index_stays_bounded_across_many_focus_switches() {
    let store = MemoryKeyValueStore::default();
    let clock = ManualClock::default();
    let mut page = load_page(&store, &clock);
    let windows: Vec<_> = (0..4)
        .map(|_| page.session.open_window(WindowKind::Terminal).expect("open"))
        .collect();
    let base = page.session.config().base_z_index;

    for round in 0..1_000 {
        page.session.bring_to_front(windows[round % windows.len()]);
        let max = page.session.registry().max_z_index().expect("windows open");
        assert!(max < base + windows.len() as u32);
    }
}

#[derive(Debug, Clone)]
enum SessionOp {
    Open(usize),
    NewTab(usize),
    CloseTab(usize, usize),
    Reorder(usize, usize, Option<usize>),
    Focus(usize, usize),
    Save,
    Restore,
}

fn session_op() -> impl Strategy<Value = SessionOp> {
    prop_oneof![
        1 => (0..3usize).prop_map(SessionOp::Open),
        2 => any::<usize>().prop_map(SessionOp::NewTab),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(w, i)| SessionOp::CloseTab(w, i)),
        1 => (any::<usize>(), any::<usize>(), proptest::option::of(any::<usize>()))
            .prop_map(|(w, i, before)| SessionOp::Reorder(w, i, before)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(w, i)| SessionOp::Focus(w, i)),
        1 => Just(SessionOp::Save),
        1 => Just(SessionOp::Restore),
    ]
}

/// Picks the window at `index` (modulo the open count) with its tab ids.
fn pick(page: &Page, index: usize) -> Option<(WindowId, Vec<InstanceId>)> {
    let windows = page.session.registry().windows(None);
    let window = windows.get(index % windows.len().max(1))?;
    Some((window.id(), window.instances().ids()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_operation_sequence_keeps_the_graph_consistent(
        ops in proptest::collection::vec(session_op(), 1..120)
    ) {
        let store = MemoryKeyValueStore::default();
        let clock = ManualClock::default();
        let mut page = load_page(&store, &clock);
        let kinds = [WindowKind::FileBrowser, WindowKind::Terminal, WindowKind::TextEditor];

        for op in ops {
            match op {
                SessionOp::Open(kind) => {
                    page.session.open_window(kinds[kind]);
                }
                SessionOp::NewTab(w) => {
                    if let Some((window, _)) = pick(&page, w) {
                        page.session.new_instance(window);
                    }
                }
                SessionOp::CloseTab(w, i) => {
                    if let Some((window, ids)) = pick(&page, w) {
                        page.session.close_instance(window, ids[i % ids.len()]);
                    }
                }
                SessionOp::Reorder(w, i, before) => {
                    if let Some((window, ids)) = pick(&page, w) {
                        let active = page.session.active_instance(window);
                        let before = before.map(|b| ids[b % ids.len()]);
                        page.session.reorder_instance(window, ids[i % ids.len()], before);
                        prop_assert_eq!(page.session.active_instance(window), active);
                    }
                }
                SessionOp::Focus(w, i) => {
                    if let Some((window, ids)) = pick(&page, w) {
                        page.session.set_active_instance(window, ids[i % ids.len()]);
                        page.session.bring_to_front(window);
                    }
                }
                SessionOp::Save => {
                    page.session.save(SaveMode::Immediate);
                }
                SessionOp::Restore => {
                    page.session.restore();
                }
            }

            let registry = page.session.registry();
            let mut order = registry.focus_order().to_vec();
            order.sort();
            let ids: Vec<WindowId> = registry.windows(None).iter().map(|window| window.id()).collect();
            prop_assert_eq!(order, ids, "focus stack must list each open window once");
            for window in registry.windows(None) {
                let instances = window.instances();
                prop_assert!(!instances.is_empty(), "empty {} left open", window.id());
                let active = instances.active_id();
                prop_assert!(active.is_some_and(|id| instances.position(id).is_some()));
                let mounted: Vec<u64> = active.map(|id| id.0).into_iter().collect();
                prop_assert_eq!(page.host.mounted_in(window.id().0), mounted);
            }
            prop_assert_eq!(page.mounts.attached().len(), registry.len());
            prop_assert_eq!(page.host.live_mounts(), registry.len());
        }
    }
}
