//! Typed host-domain contracts shared by the desktop session core and browser adapters.
//!
//! This crate is the API-first boundary for platform services consumed by the session core:
//! durable key/value storage, time sources, and virtual-path helpers. Concrete browser adapters
//! live in `platform_host_web`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod fs;
pub mod storage;
pub mod time;

pub use fs::path::{normalize_virtual_path, rewrite_path_prefix};
pub use storage::kv::{load_typed_with, save_typed_with, KeyValueStore, MemoryKeyValueStore};
pub use time::{next_monotonic_timestamp_ms, unix_time_ms_now, Clock, ManualClock, SystemClock};
