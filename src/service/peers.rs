use futures::{
    channel::{mpsc, oneshot},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::DirectoryRecord;

/// Capacity of the command channel between clients and the backend.
const COMMAND_BUFFER: usize = 16;

/// A complete share listing for one peer: the openly shared directories
/// plus the ones the peer restricts (e.g. behind reciprocal sharing).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareListing {
    #[serde(default)]
    pub directories: Vec<DirectoryRecord>,
    #[serde(default)]
    pub locked_directories: Vec<DirectoryRecord>,
}

/// Progress of an in-flight browse request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseStatus {
    #[serde(default)]
    pub percent_complete: f64,
}

/// Failures surfaced by the peer service. Serializable because the last
/// failure is part of the persisted session state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BrowseError {
    /// The remote peer rejected the request, timed out, or dropped the
    /// connection mid-listing.
    #[error("failed to browse {username}: {reason}")]
    Peer { username: String, reason: String },

    /// The service backend has shut down and can take no more commands.
    #[error("peer service unavailable")]
    Disconnected,
}

/// Commands a session sends to the peer-service backend. Each carries the
/// oneshot sender the backend answers on.
#[derive(Debug)]
pub enum Command {
    Browse {
        username: String,
        sender: oneshot::Sender<Result<ShareListing, BrowseError>>,
    },
    Status {
        username: String,
        sender: oneshot::Sender<Result<BrowseStatus, BrowseError>>,
    },
}

/// Handle for issuing peer-service commands from anywhere in the client.
#[derive(Clone)]
pub struct Client {
    sender: mpsc::Sender<Command>,
}

impl Client {
    /// Create a client together with the command receiver its backend
    /// drains. Dropping the receiver makes every later call fail with
    /// [`BrowseError::Disconnected`].
    pub fn new() -> (Self, mpsc::Receiver<Command>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        (Self { sender }, receiver)
    }

    /// Request the full share listing from the given peer. Resolves once
    /// the peer has delivered every directory, which can take tens of
    /// seconds for a large share.
    pub async fn browse(&mut self, username: &str) -> Result<ShareListing, BrowseError> {
        let (sender, receiver) = oneshot::channel();
        self.sender
            .send(Command::Browse {
                username: username.to_owned(),
                sender,
            })
            .await
            .map_err(|_| BrowseError::Disconnected)?;
        receiver.await.map_err(|_| BrowseError::Disconnected)?
    }

    /// Ask how much of the given peer's listing has arrived so far.
    pub async fn browse_status(&mut self, username: &str) -> Result<BrowseStatus, BrowseError> {
        let (sender, receiver) = oneshot::channel();
        self.sender
            .send(Command::Status {
                username: username.to_owned(),
                sender,
            })
            .await
            .map_err(|_| BrowseError::Disconnected)?;
        receiver.await.map_err(|_| BrowseError::Disconnected)?
    }
}
