//! Domain models for polinpin.
//!
//! # Core Concepts
//!
//! ## Study content
//!
//! - [`Study`]: A named tree test: one navigation tree plus the tasks participants
//!   try to complete by picking a node.
//! - [`Node`]: One entry of the navigation tree. Children are owned by their parent,
//!   so a tree never shares subtrees.
//! - [`Task`]: A prompt and the node IDs that count as a correct answer.
//!
//! ## Accounts
//!
//! - [`User`]: Registered credentials keyed by username.
//! - [`UserSession`]: What register/login hand back to the client.
//!
//! Studies are keyed externally; the key is never stored inside the record.

mod study;
mod user;

pub use study::*;
pub use user::*;
