//! Durable storage contracts shared by the session core and host adapters.

pub mod kv;
