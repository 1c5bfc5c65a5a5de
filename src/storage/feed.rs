//! In-process change feed
//!
//! Every storage mutation publishes a [`Change`] here, subscriptions listen to it to know when
//! to fetch a fresh snapshot.

use std::fmt;
use std::str::FromStr;

use tokio::sync::broadcast;
use uuid::Uuid;

/// Buffer capacity of the broadcast channel
///
/// Slow receivers that fall behind observe a lag and resync with a fresh snapshot.
const DEFAULT_CAPACITY: usize = 256;

/// Collections that can be subscribed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Notes,
    Todos,
    Folders,
}

impl Collection {
    fn as_str(self) -> &'static str {
        match self {
            Collection::Notes => "notes",
            Collection::Todos => "todos",
            Collection::Folders => "folders",
        }
    }
}

/// Something changed in a collection of a user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Change {
    /// The changed collection
    pub collection: Collection,

    /// The owner of the changed records
    pub owner: Uuid,
}

impl Change {
    pub fn new(collection: Collection, owner: Uuid) -> Self {
        Self { collection, owner }
    }
}

/// Textual form of a change, as used in notification payloads: `<collection>:<owner>`
impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection.as_str(), self.owner)
    }
}

impl FromStr for Change {
    type Err = String;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let (collection, owner) = payload
            .split_once(':')
            .ok_or_else(|| format!("Invalid change payload: {payload}"))?;

        let collection = match collection {
            "notes" => Collection::Notes,
            "todos" => Collection::Todos,
            "folders" => Collection::Folders,
            other => return Err(format!("Unknown collection: {other}")),
        };

        let owner = Uuid::parse_str(owner).map_err(|err| err.to_string())?;

        Ok(Self { collection, owner })
    }
}

/// What travels over the feed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// A collection of a user changed
    Changed(Change),

    /// Changes may have been missed, every subscription fetches a fresh snapshot
    Resync,
}

/// Fan-out of changes to any number of subscriptions
#[derive(Clone, Debug)]
pub struct Feed {
    sender: broadcast::Sender<Signal>,
}

impl Feed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { sender }
    }

    /// Publish a change to all current subscribers
    pub fn publish(&self, change: Change) {
        // an error only means nobody is listening
        let _ = self.sender.send(Signal::Changed(change));
    }

    /// Ask every subscription to fetch again, whatever it watches
    pub fn resync(&self) {
        let _ = self.sender.send(Signal::Resync);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}
