//! Seam to the peer service that performs the actual remote browsing.
//!
//! The session never talks to the network itself: it sends [`Command`]s
//! through a [`Client`] and whatever backend owns the receiver answers on
//! the embedded oneshot channels.

mod peers;

pub use peers::{BrowseError, BrowseStatus, Client, Command, ShareListing};
