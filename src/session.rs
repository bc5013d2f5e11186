use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::poller::PollerHandle;
use crate::service::{BrowseError, BrowseStatus, Client, ShareListing};
use crate::store::{SessionSnapshot, SnapshotStore};
use crate::tree::{build_forest, infer_separator, DirectoryNode, DirectoryRecord, FileRecord};

/// Capacity of the channel completions and poll readings re-enter on.
const EVENT_BUFFER: usize = 64;

/// Where the session's browse request currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowseState {
    #[default]
    Idle,
    Pending,
    Complete,
    Error,
}

/// Aggregate counts for a fetched share, captured from the two listings
/// before they are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub directories: u64,
    pub files: u64,
    pub locked_directories: u64,
    pub locked_files: u64,
}

impl ShareInfo {
    fn of(directories: &[DirectoryRecord], locked: &[DirectoryRecord]) -> Self {
        Self {
            directories: directories.len() as u64,
            files: directories.iter().map(|d| d.file_count).sum(),
            locked_directories: locked.len() as u64,
            locked_files: locked.iter().map(|d| d.file_count).sum(),
        }
    }
}

impl fmt::Display for ShareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files in {} directories (including {} files in {} locked directories)",
            self.files + self.locked_files,
            self.directories + self.locked_directories,
            self.locked_files,
            self.locked_directories,
        )
    }
}

/// Completions of background work, read from the receiver returned by
/// [`BrowseSession::new`] and fed to [`BrowseSession::handle_event`].
#[derive(Debug)]
pub enum SessionEvent {
    /// The browse request issued under `generation` resolved.
    BrowseFinished {
        generation: u64,
        outcome: Result<ShareListing, BrowseError>,
    },
    /// The poller took a progress reading under `generation`.
    StatusUpdated { generation: u64, status: BrowseStatus },
}

/// One browse lifecycle against one remote peer.
///
/// The session is single-owner state: user intents arrive as method calls
/// and background completions as [`SessionEvent`]s, one at a time, so no
/// transition ever races another. Every result-carrying event is tagged
/// with the generation it was issued under; bumping the generation (a new
/// browse, or `clear`) orphans whatever is still in flight.
pub struct BrowseSession {
    pub username: String,
    pub browse_state: BrowseState,
    /// Last polled percent-complete for the in-flight request.
    pub browse_status: f64,
    pub browse_error: Option<BrowseError>,
    pub tree: Vec<DirectoryNode>,
    pub separator: Option<char>,
    /// The directory whose files the detail view shows, subtree stripped.
    pub selected_directory: Option<DirectoryNode>,
    pub info: ShareInfo,
    generation: u64,
    poller: Option<PollerHandle>,
    client: Client,
    store: SnapshotStore,
    events: mpsc::Sender<SessionEvent>,
}

impl BrowseSession {
    /// Build a session over the given service client and snapshot store,
    /// restoring whatever state the store holds. The returned receiver
    /// carries the completions the host must feed back through
    /// [`handle_event`](Self::handle_event).
    pub fn new(client: Client, store: SnapshotStore) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        let snapshot = store.load();
        let session = Self {
            username: snapshot.username,
            browse_state: snapshot.browse_state,
            browse_status: snapshot.browse_status,
            browse_error: snapshot.browse_error,
            tree: snapshot.tree,
            separator: snapshot.separator,
            selected_directory: snapshot.selected_directory,
            info: snapshot.info,
            generation: 0,
            poller: None,
            client,
            store,
            events,
        };
        (session, receiver)
    }

    /// Ask the service for `username`'s full share listing and enter the
    /// pending state; the result re-enters through the event channel.
    ///
    /// Callers must not start a second browse while one is pending (e.g.
    /// by disabling the trigger); this layer does not guard against it.
    pub fn browse(&mut self, username: &str) {
        self.username = username.to_owned();
        self.browse_state = BrowseState::Pending;
        self.browse_error = None;
        self.generation = self.generation.wrapping_add(1);

        let generation = self.generation;
        let mut client = self.client.clone();
        let events = self.events.clone();
        let target = self.username.clone();
        tokio::spawn(async move {
            let outcome = client.browse(&target).await;
            let finished = SessionEvent::BrowseFinished { generation, outcome };
            if events.send(finished).await.is_err() {
                tracing::debug!("browse of {target} finished after its session closed");
            }
        });

        self.poller = Some(PollerHandle::spawn(
            self.client.clone(),
            self.username.clone(),
            generation,
            self.events.clone(),
        ));
        tracing::info!("browsing {}", self.username);
    }

    /// Apply a background completion. Events tagged with a generation
    /// other than the live one belong to a superseded request and are
    /// dropped; the session state, not the background task, decides what
    /// is shown.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::BrowseFinished {
                generation,
                outcome,
            } => {
                if generation != self.generation {
                    tracing::debug!("dropping browse result from a superseded request");
                    return;
                }
                match outcome {
                    Ok(listing) => self.complete(listing),
                    Err(error) => self.fail(error),
                }
            }
            SessionEvent::StatusUpdated { generation, status } => {
                if generation == self.generation && self.browse_state == BrowseState::Pending {
                    self.browse_status = status.percent_complete;
                }
            }
        }
    }

    fn complete(&mut self, listing: ShareListing) {
        let ShareListing {
            directories,
            locked_directories,
        } = listing;

        // Separator and counters come from the listings as received,
        // before the locked set is folded in.
        let separator = infer_separator(&directories);
        let info = ShareInfo::of(&directories, &locked_directories);

        let mut combined = directories;
        combined.extend(
            locked_directories
                .into_iter()
                .map(|directory| DirectoryRecord {
                    locked: true,
                    ..directory
                }),
        );

        self.tree = build_forest(&combined, separator);
        self.separator = separator;
        self.info = info;
        self.browse_state = BrowseState::Complete;
        self.browse_error = None;
        self.poller = None;
        tracing::info!("browsed {}: {}", self.username, self.info);
        self.persist();
    }

    fn fail(&mut self, error: BrowseError) {
        tracing::warn!("{error}");
        self.browse_state = BrowseState::Error;
        self.browse_error = Some(error);
        // The previous share stays on screen; only the state and the
        // error change.
        self.poller = None;
    }

    /// Reset to the initial empty session, orphaning anything still in
    /// flight.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.poller = None;
        self.username.clear();
        self.browse_state = BrowseState::Idle;
        self.browse_status = 0.0;
        self.browse_error = None;
        self.tree = Vec::new();
        self.separator = None;
        self.selected_directory = None;
        self.info = ShareInfo::default();
        self.persist();
    }

    /// The Escape key clears the session.
    pub fn escape(&mut self) {
        self.clear();
    }

    /// Remember `directory` as the one whose files the detail view shows.
    /// Only the node itself is kept; its subtree is dropped.
    pub fn select_directory(&mut self, directory: &DirectoryNode) {
        self.selected_directory = Some(directory.without_children());
        self.persist();
    }

    pub fn deselect_directory(&mut self) {
        self.selected_directory = None;
        self.persist();
    }

    /// Files of the selected directory with their names expanded to full
    /// paths. Empty while nothing is selected; names are left as-is when
    /// the share has no separator to join on.
    pub fn selected_files(&self) -> Vec<FileRecord> {
        let Some(directory) = &self.selected_directory else {
            return Vec::new();
        };
        directory
            .files
            .iter()
            .map(|file| {
                let filename = match self.separator {
                    Some(separator) => {
                        format!("{}{}{}", directory.name, separator, file.filename)
                    }
                    None => file.filename.clone(),
                };
                FileRecord {
                    filename,
                    ..file.clone()
                }
            })
            .collect()
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.browse_state, BrowseState::Pending)
    }

    /// The observable state as one value, as persisted and as a host
    /// should snapshot it.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            username: self.username.clone(),
            browse_state: self.browse_state,
            browse_status: self.browse_status,
            browse_error: self.browse_error.clone(),
            tree: self.tree.clone(),
            separator: self.separator,
            selected_directory: self.selected_directory.clone(),
            info: self.info,
        }
    }

    fn persist(&self) {
        // Fire and forget: the write happens off the event path and any
        // failure is logged by the store.
        let _ = self.store.save(self.snapshot());
    }
}
