//! Browser (`wasm32`) implementations of [`platform_host`] and [`desktop_app_contract`]
//! service contracts.
//!
//! - [`WebKeyValueStore`]: durable session storage over `localStorage`.
//! - [`DomMountProvider`]: per-window container elements under the desktop root.
//!
//! On non-wasm targets both adapters compile to inert fallbacks so the session core can be
//! exercised natively.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod mount;
pub mod storage;

pub use mount::{DomMountProvider, DEFAULT_DESKTOP_ROOT_ID};
pub use storage::local_kv::WebKeyValueStore;
