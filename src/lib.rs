//! Embercast — a build-completion chat notifier.
//!
//! Reacts to build-completed events and decides whether, and what, to tell a
//! chat room. Delivery is fire-and-forget through a pluggable backend; no
//! error in this crate may ever fail the triggering build.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod build;
pub mod compose;
pub mod config;
pub mod delivery;
pub mod logging;
pub mod mentions;
pub mod policy;
pub mod publisher;
