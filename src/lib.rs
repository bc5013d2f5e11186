//! Core session logic for browsing a remote peer's shared files.
//!
//! A host application wires a [`Client`] to whatever backend performs the
//! actual peer browsing, restores a [`BrowseSession`] from a
//! [`SnapshotStore`], then drives the session: user intents go in as
//! method calls, and completions of background work come back through the
//! event receiver and [`BrowseSession::handle_event`]. The session turns
//! the peer's flat path listing into a navigable directory forest and
//! keeps itself persisted across restarts as a compressed snapshot.

pub mod service;
pub mod session;
pub mod store;
pub mod tree;

mod poller;

pub use service::{BrowseError, BrowseStatus, Client, Command, ShareListing};
pub use session::{BrowseSession, BrowseState, SessionEvent, ShareInfo};
pub use store::{FileStorage, MemoryStorage, SessionSnapshot, SnapshotStore, Storage};
pub use tree::{build_forest, infer_separator, DirectoryNode, DirectoryRecord, FileRecord};
