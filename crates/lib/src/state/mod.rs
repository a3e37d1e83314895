//! Durable control-plane state.
//!
//! The [`StateRepository`] persists the last committed [`Snapshot`] (and the
//! bootstrap [`RootConfig`](crate::config::RootConfig)) as opaque blobs in a
//! [`KvStore`]. Each blob lives under one key and is replaced with a single
//! overwrite, so a reader sees either the old or the new value, never a mix.
//!
//! # Backends
//!
//! | Location | Backend |
//! |---|---|
//! | `redis://host:port/` | [`RedisKv`] |
//! | `memory:` | [`MemoryKv`] |
//! | `file:///dir` or `/dir` | [`FileKv`] |

mod kv;
mod repository;
mod types;

pub use kv::{FileKv, KvError, KvStore, MemoryKv, RedisKv, open_store};
pub use repository::{StateError, StateRepository};
pub use types::Snapshot;
