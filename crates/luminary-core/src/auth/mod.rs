//! Session handling for the sync subsystem.
//!
//! The authentication provider itself is external: the host application
//! obtains tokens and hands them to this subsystem. `Session` only persists
//! the current token between runs and answers expiry questions; draining the
//! queue or downloading content without a valid session is a per-call error.

pub mod session;

pub use session::{Session, SessionData};
