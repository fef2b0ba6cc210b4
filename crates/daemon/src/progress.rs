//! Progress streaming for subscription indexing jobs.
//!
//! The source models this as a list of progress callbacks invoked on every
//! state change. Per spec.md §9's explicit redesign note, this becomes a
//! single broadcast channel per subscription: `subscribe` returns a reader
//! handle whose drop unsubscribes, and publishing never holds a lock while
//! the channel send happens.

use graphdex_core::SubscriptionStatus;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, broadcast};

/// How long a terminal progress record lingers after the job finishes, so a
/// consumer that was mid-poll still observes the terminal state.
pub const TERMINAL_LINGER: Duration = Duration::from_secs(30);
const CHANNEL_CAPACITY: usize = 256;

/// One point-in-time state of a subscription's indexing job.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
  pub subscription_id: String,
  pub status: SubscriptionStatus,
  pub scanned: u32,
  pub fast_skipped: u32,
  pub indexed: u32,
  pub skipped: u32,
  pub errored: u32,
  pub current_file: Option<String>,
  pub error: Option<String>,
}

impl ProgressEvent {
  pub fn queued(subscription_id: impl Into<String>) -> Self {
    Self {
      subscription_id: subscription_id.into(),
      status: SubscriptionStatus::Active,
      scanned: 0,
      fast_skipped: 0,
      indexed: 0,
      skipped: 0,
      errored: 0,
      current_file: None,
      error: None,
    }
  }

  fn is_terminal(&self) -> bool {
    matches!(
      self.status,
      SubscriptionStatus::Completed | SubscriptionStatus::Cancelled | SubscriptionStatus::Error
    )
  }
}

struct Tracked {
  event: ProgressEvent,
  terminal_since: Option<Instant>,
}

/// Per-subscription broadcast hub plus a snapshot table for `getProgress`/
/// `getAllProgress`-style point-in-time reads.
#[derive(Default)]
pub struct ProgressBus {
  channels: RwLock<HashMap<String, broadcast::Sender<ProgressEvent>>>,
  snapshots: RwLock<HashMap<String, Tracked>>,
}

impl ProgressBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Publish a state change. Delivered to every current subscriber; a
  /// subscription with no subscribers is a no-op broadcast, not an error.
  pub async fn publish(&self, event: ProgressEvent) {
    let terminal_since = event.is_terminal().then(Instant::now);
    {
      let mut snapshots = self.snapshots.write().await;
      snapshots.insert(
        event.subscription_id.clone(),
        Tracked {
          event: event.clone(),
          terminal_since,
        },
      );
    }

    let sender = {
      let channels = self.channels.read().await;
      channels.get(&event.subscription_id).cloned()
    };
    if let Some(sender) = sender {
      // No receivers is the common case between polls; not an error.
      let _ = sender.send(event);
    }
  }

  /// Subscribe to a subscription's progress stream. Dropping the returned
  /// receiver is the unsubscribe.
  pub async fn subscribe(&self, subscription_id: &str) -> broadcast::Receiver<ProgressEvent> {
    let mut channels = self.channels.write().await;
    channels
      .entry(subscription_id.to_string())
      .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
      .subscribe()
  }

  /// Point-in-time snapshot for one subscription.
  pub async fn snapshot(&self, subscription_id: &str) -> Option<ProgressEvent> {
    self.prune_expired().await;
    self.snapshots.read().await.get(subscription_id).map(|t| t.event.clone())
  }

  /// Point-in-time snapshots for every subscription with a tracked record.
  pub async fn all_snapshots(&self) -> Vec<ProgressEvent> {
    self.prune_expired().await;
    self.snapshots.read().await.values().map(|t| t.event.clone()).collect()
  }

  async fn prune_expired(&self) {
    let mut snapshots = self.snapshots.write().await;
    snapshots.retain(|_, t| t.terminal_since.is_none_or(|since| since.elapsed() < TERMINAL_LINGER));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscriber_receives_published_event() {
    let bus = ProgressBus::new();
    let mut rx = bus.subscribe("sub-1").await;

    bus.publish(ProgressEvent::queued("sub-1")).await;
    let event = rx.recv().await.unwrap();
    assert_eq!(event.subscription_id, "sub-1");
    assert_eq!(event.status, SubscriptionStatus::Active);
  }

  #[tokio::test]
  async fn publish_without_subscribers_is_not_an_error() {
    let bus = ProgressBus::new();
    bus.publish(ProgressEvent::queued("sub-1")).await;
    assert!(bus.snapshot("sub-1").await.is_some());
  }

  #[tokio::test]
  async fn snapshot_reflects_latest_event() {
    let bus = ProgressBus::new();
    let mut event = ProgressEvent::queued("sub-1");
    event.status = SubscriptionStatus::Indexing;
    event.indexed = 3;
    bus.publish(event).await;

    let snapshot = bus.snapshot("sub-1").await.unwrap();
    assert_eq!(snapshot.status, SubscriptionStatus::Indexing);
    assert_eq!(snapshot.indexed, 3);
  }

  #[tokio::test]
  async fn all_snapshots_covers_every_subscription() {
    let bus = ProgressBus::new();
    bus.publish(ProgressEvent::queued("sub-1")).await;
    bus.publish(ProgressEvent::queued("sub-2")).await;

    let all = bus.all_snapshots().await;
    assert_eq!(all.len(), 2);
  }

  #[tokio::test]
  async fn terminal_snapshot_expires_after_linger() {
    let bus = ProgressBus::new();
    let mut event = ProgressEvent::queued("sub-1");
    event.status = SubscriptionStatus::Completed;
    bus.publish(event).await;

    assert!(bus.snapshot("sub-1").await.is_some());

    {
      let mut snapshots = bus.snapshots.write().await;
      let tracked = snapshots.get_mut("sub-1").unwrap();
      tracked.terminal_since = Some(Instant::now() - TERMINAL_LINGER - Duration::from_secs(1));
    }

    assert!(bus.snapshot("sub-1").await.is_none());
  }
}
