//! Live snapshot subscriptions
//!
//! A subscription delivers the full collection of a user right away and again after every
//! change of that collection, until it is cancelled.

use std::future::Future;

use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Change;
use super::Collection;
use super::Feed;
use super::Result;
use super::Signal;

/// Snapshots buffered for a subscriber that is not keeping up
const SNAPSHOT_BUFFER: usize = 8;

/// A cancellable stream of full snapshots
#[derive(Debug)]
pub struct Subscription<T> {
    /// Receiving end of the snapshots
    receiver: mpsc::Receiver<Vec<T>>,

    /// Stops the task producing the snapshots
    cancel: CancellationToken,
}

impl<T> Subscription<T>
where
    T: Send + 'static,
{
    /// Start a subscription on a collection of a single owner
    ///
    /// `fetch` produces a full snapshot, it is called once at the start and after every
    /// matching change on the feed.
    pub fn spawn<F, Fut>(feed: &Feed, collection: Collection, owner: Uuid, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        // listen before the first fetch, so no change slips in between
        let mut signals = feed.subscribe();
        let watched = Change::new(collection, owner);

        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            tracing::debug!("Subscription started on {watched}");

            if deliver(&sender, &token, &fetch, watched).await {
                loop {
                    let signal = tokio::select! {
                        () = token.cancelled() => break,
                        signal = signals.recv() => signal,
                    };

                    match signal {
                        Ok(Signal::Changed(change)) if change == watched => {}
                        Ok(Signal::Changed(_)) => continue,
                        Ok(Signal::Resync) => {
                            tracing::debug!("Subscription on {watched} resyncs");
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Subscription on {watched} lagged {skipped} changes");
                        }
                        Err(RecvError::Closed) => break,
                    }

                    if !deliver(&sender, &token, &fetch, watched).await {
                        break;
                    }
                }
            }

            tracing::debug!("Subscription ended on {watched}");
        });

        Self { receiver, cancel }
    }
}

/// Fetch and send a single snapshot
///
/// Returns `false` when the subscription is over
async fn deliver<T, F, Fut>(
    sender: &mpsc::Sender<Vec<T>>,
    token: &CancellationToken,
    fetch: &F,
    watched: Change,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let snapshot = match fetch().await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            // the next change will try again
            tracing::warn!("Could not fetch snapshot for {watched}: {err}");
            return true;
        }
    };

    tokio::select! {
        () = token.cancelled() => false,
        sent = sender.send(snapshot) => sent.is_ok(),
    }
}

impl<T> Subscription<T> {
    /// Wait for the next snapshot
    ///
    /// Returns `None` once the subscription is cancelled
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        tokio::select! {
            () = self.cancel.cancelled() => None,
            snapshot = self.receiver.recv() => snapshot,
        }
    }

    /// Stop the subscription, calling it again does nothing
    pub fn unsubscribe(&mut self) {
        self.cancel.cancel();
        self.receiver.close();
    }

    /// Turn the subscription into a stream of snapshots, dropping the stream unsubscribes
    pub fn into_stream(self) -> impl Stream<Item = Vec<T>> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|snapshot| (snapshot, subscription))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;

    fn counting_subscription(feed: &Feed, owner: Uuid) -> Subscription<usize> {
        let counter = Arc::new(AtomicUsize::new(0));

        Subscription::spawn(feed, Collection::Notes, owner, move || {
            let counter = Arc::clone(&counter);
            async move { Ok(vec![counter.fetch_add(1, Ordering::SeqCst)]) }
        })
    }

    #[tokio::test]
    async fn test_initial_snapshot_and_changes() {
        let feed = Feed::new();
        let owner = Uuid::new_v4();
        let mut subscription = counting_subscription(&feed, owner);

        assert_eq!(subscription.next().await, Some(vec![0]));

        feed.publish(Change::new(Collection::Notes, owner));
        assert_eq!(subscription.next().await, Some(vec![1]));
    }

    #[tokio::test]
    async fn test_ignores_other_owners_and_collections() {
        let feed = Feed::new();
        let owner = Uuid::new_v4();
        let mut subscription = counting_subscription(&feed, owner);

        assert_eq!(subscription.next().await, Some(vec![0]));

        feed.publish(Change::new(Collection::Notes, Uuid::new_v4()));
        feed.publish(Change::new(Collection::Todos, owner));
        feed.publish(Change::new(Collection::Notes, owner));

        // only the last change triggers a snapshot
        assert_eq!(subscription.next().await, Some(vec![1]));

        let nothing_more =
            tokio::time::timeout(Duration::from_millis(50), subscription.next()).await;
        assert!(nothing_more.is_err());
    }

    #[tokio::test]
    async fn test_resync_refetches_every_subscription() {
        let feed = Feed::new();
        let mut notes = counting_subscription(&feed, Uuid::new_v4());
        let mut others = counting_subscription(&feed, Uuid::new_v4());

        assert_eq!(notes.next().await, Some(vec![0]));
        assert_eq!(others.next().await, Some(vec![0]));

        feed.resync();

        assert_eq!(notes.next().await, Some(vec![1]));
        assert_eq!(others.next().await, Some(vec![1]));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let feed = Feed::new();
        let owner = Uuid::new_v4();
        let mut subscription = counting_subscription(&feed, owner);

        assert_eq!(subscription.next().await, Some(vec![0]));

        subscription.unsubscribe();
        subscription.unsubscribe();

        feed.publish(Change::new(Collection::Notes, owner));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_subscription_alive() {
        let feed = Feed::new();
        let owner = Uuid::new_v4();
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&attempts);
        let mut subscription = Subscription::spawn(&feed, Collection::Notes, owner, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(crate::storage::Error::Connection("gone".to_string()))
                } else {
                    Ok(vec!["back"])
                }
            }
        });

        feed.publish(Change::new(Collection::Notes, owner));

        assert_eq!(subscription.next().await, Some(vec!["back"]));
    }
}
