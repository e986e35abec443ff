// src/exec/mod.rs

//! Job submission layer.
//!
//! - [`job`] holds what is exchanged with a backend: [`ScheduledTask`] going
//!   out, [`JobHandle`] coming back.
//! - [`backend`] provides the [`DrmBackend`] trait the runtime submits
//!   through.
//! - [`local`] runs jobs as local processes with `tokio::process`.

pub mod backend;
pub mod job;
pub mod local;

pub use backend::DrmBackend;
pub use job::{JobHandle, ScheduledTask};
pub use local::LocalBackend;
