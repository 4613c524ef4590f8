//! Broadcast primitives shared by every session.
//!
//! Two kinds of stream are exposed to observers:
//!
//! - [`StateChannel`] always holds a value. A new subscriber sees the latest
//!   value first, then every later update. Slow subscribers skip intermediate
//!   values and only ever see the newest one.
//! - [`EventChannel`] carries transient notifications. Only subscribers
//!   attached at the moment of posting receive an event; nothing is replayed.
//!
//! # Example
//!
//! ```rust
//! use installer_core::channels::StateChannel;
//!
//! let progress = StateChannel::new(0u8);
//! progress.publish(1);
//! progress.publish(2);
//!
//! let rx = progress.subscribe();
//! // The first value a late subscriber sees is the latest one.
//! assert_eq!(rx.current(), 2);
//! ```

use tokio::sync::{broadcast, watch};

/// Default capacity of an event channel.
/// Subscribers that fall further behind than this skip the oldest events.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Largest backlog an event channel will allocate per session.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

// ============================================================================
// State channel
// ============================================================================

/// Latest-value broadcast channel.
///
/// Publishing never blocks and never fails, even with zero subscribers; the
/// value simply replaces the previous one.
#[derive(Debug)]
pub struct StateChannel<T> {
    sender: watch::Sender<T>,
}

impl<T: Clone> StateChannel<T> {
    /// Create a channel holding `initial`.
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Replace the current value and wake every subscriber.
    pub fn publish(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Modify the current value in place, waking subscribers only when `f`
    /// returns `true`. Returns what `f` returned.
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.sender.send_if_modified(f)
    }

    /// The latest published value.
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Subscribe to this channel. See [`StateSubscription::next`].
    pub fn subscribe(&self) -> StateSubscription<T> {
        StateSubscription {
            receiver: self.sender.subscribe(),
            primed: false,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Default> Default for StateChannel<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A subscription to a [`StateChannel`].
#[derive(Debug)]
pub struct StateSubscription<T> {
    receiver: watch::Receiver<T>,
    primed: bool,
}

impl<T: Clone> StateSubscription<T> {
    /// Wait for the next value.
    ///
    /// The first call returns the latest value immediately. Later calls wait
    /// until a newer value is published and return it. Returns `None` once the
    /// channel has been dropped.
    pub async fn next(&mut self) -> Option<T> {
        if !self.primed {
            self.primed = true;
            return Some(self.receiver.borrow_and_update().clone());
        }
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// The latest value, without waiting and without marking it seen.
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Whether [`next`](Self::next) would return without waiting.
    pub fn has_changed(&self) -> bool {
        !self.primed || self.receiver.has_changed().unwrap_or(false)
    }
}

// ============================================================================
// Event channel
// ============================================================================

/// Transient multicast channel.
///
/// Uses a tokio broadcast channel internally. Events posted while nobody is
/// subscribed are dropped.
#[derive(Debug)]
pub struct EventChannel<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventChannel<T> {
    /// Create a channel with [`DEFAULT_EVENT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a channel with the given per-subscriber backlog, clamped to
    /// `1..=MAX_EVENT_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CAPACITY));
        Self { sender }
    }

    /// Hand `event` to every live subscriber, then yield to the scheduler.
    ///
    /// Returns the number of subscribers that received the event.
    pub async fn post(&self, event: T) -> usize {
        let delivered = self.emit(event);
        tokio::task::yield_now().await;
        delivered
    }

    /// Non-suspending form of [`post`](Self::post).
    pub fn emit(&self, event: T) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events posted from now on.
    pub fn subscribe(&self) -> EventSubscription<T> {
        EventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription to an [`EventChannel`].
#[derive(Debug)]
pub struct EventSubscription<T> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> EventSubscription<T> {
    /// Wait for the next event. Returns `None` once the channel is dropped.
    ///
    /// A subscriber that fell behind skips the events it missed and resumes
    /// with the oldest one still buffered.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already-buffered event, if any.
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    mod state_channel {
        use super::*;

        #[test]
        fn get_returns_initial_value() {
            let channel = StateChannel::new("ready");
            assert_eq!(channel.get(), "ready");
        }

        #[test]
        fn default_uses_type_default() {
            let channel: StateChannel<bool> = StateChannel::default();
            assert!(!channel.get());
        }

        #[test]
        fn publish_without_subscribers_keeps_latest() {
            let channel = StateChannel::new(0);
            channel.publish(1);
            channel.publish(2);
            assert_eq!(channel.get(), 2);
            assert_eq!(channel.subscriber_count(), 0);
        }

        #[tokio::test]
        async fn update_if_skips_wakeup_when_unchanged() {
            let channel = StateChannel::new(vec![1, 2]);
            let mut rx = channel.subscribe();
            assert_eq!(rx.next().await, Some(vec![1, 2]));

            assert!(!channel.update_if(|v| v.contains(&9)));
            assert!(!rx.has_changed());

            assert!(channel.update_if(|v| {
                v.push(3);
                true
            }));
            assert!(rx.has_changed());
            assert_eq!(rx.current(), vec![1, 2, 3]);
        }

        #[test]
        fn subscriber_count_tracks_drops() {
            let channel = StateChannel::new(0);
            let rx1 = channel.subscribe();
            let _rx2 = channel.subscribe();
            assert_eq!(channel.subscriber_count(), 2);
            drop(rx1);
            assert_eq!(channel.subscriber_count(), 1);
        }

        #[tokio::test]
        async fn late_subscriber_sees_latest_value_first() {
            let channel = StateChannel::new(0);
            for n in 1..=5 {
                channel.publish(n);
            }

            let mut rx = channel.subscribe();
            assert!(rx.has_changed());
            assert_eq!(rx.next().await, Some(5));
            assert!(!rx.has_changed());
        }

        #[tokio::test]
        async fn subscriber_receives_later_updates() {
            let channel = StateChannel::new(0);
            let mut rx = channel.subscribe();
            assert_eq!(rx.next().await, Some(0));

            channel.publish(7);
            assert_eq!(rx.next().await, Some(7));
        }

        #[tokio::test]
        async fn slow_subscriber_only_sees_newest() {
            let channel = StateChannel::new(0);
            let mut rx = channel.subscribe();
            assert_eq!(rx.next().await, Some(0));

            channel.publish(1);
            channel.publish(2);
            channel.publish(3);

            assert_eq!(rx.next().await, Some(3));
            let pending = timeout(Duration::from_millis(20), rx.next()).await;
            assert!(pending.is_err(), "no stale values should be queued");
        }

        #[tokio::test]
        async fn next_returns_none_after_channel_dropped() {
            let channel = StateChannel::new(0);
            let mut rx = channel.subscribe();
            assert_eq!(rx.next().await, Some(0));

            drop(channel);
            assert_eq!(rx.next().await, None);
        }
    }

    mod event_channel {
        use super::*;

        #[test]
        fn new_has_no_subscribers() {
            let channel: EventChannel<u32> = EventChannel::new();
            assert_eq!(channel.subscriber_count(), 0);
        }

        #[test]
        fn zero_capacity_is_clamped() {
            let channel: EventChannel<u32> = EventChannel::with_capacity(0);
            let mut rx = channel.subscribe();
            assert_eq!(channel.emit(1), 1);
            assert_eq!(rx.try_recv(), Some(1));
        }

        #[test]
        fn oversized_capacity_is_clamped() {
            let channel: EventChannel<u32> = EventChannel::with_capacity(usize::MAX);
            let mut rx = channel.subscribe();
            assert_eq!(channel.emit(1), 1);
            assert_eq!(rx.try_recv(), Some(1));
        }

        #[test]
        fn emit_returns_zero_with_no_subscribers() {
            let channel = EventChannel::new();
            assert_eq!(channel.emit("lost"), 0);
        }

        #[tokio::test]
        async fn post_reaches_every_subscriber() {
            let channel = EventChannel::new();
            let mut rx1 = channel.subscribe();
            let mut rx2 = channel.subscribe();

            assert_eq!(channel.post("hello").await, 2);
            assert_eq!(rx1.recv().await, Some("hello"));
            assert_eq!(rx2.recv().await, Some("hello"));
        }

        #[tokio::test]
        async fn event_without_subscribers_is_not_replayed() {
            let channel = EventChannel::new();
            assert_eq!(channel.post("early").await, 0);

            let mut rx = channel.subscribe();
            assert_eq!(rx.try_recv(), None);

            channel.post("later").await;
            assert_eq!(rx.recv().await, Some("later"));
        }

        #[tokio::test]
        async fn events_arrive_in_order() {
            let channel = EventChannel::new();
            let mut rx = channel.subscribe();

            for n in 1..=3 {
                channel.emit(n);
            }

            assert_eq!(rx.recv().await, Some(1));
            assert_eq!(rx.recv().await, Some(2));
            assert_eq!(rx.recv().await, Some(3));
        }

        #[tokio::test]
        async fn lagging_subscriber_skips_oldest() {
            let channel = EventChannel::with_capacity(2);
            let mut rx = channel.subscribe();

            for n in 1..=4 {
                channel.emit(n);
            }

            assert_eq!(rx.recv().await, Some(3));
            assert_eq!(rx.recv().await, Some(4));
        }

        #[tokio::test]
        async fn recv_returns_none_after_channel_dropped() {
            let channel: EventChannel<u32> = EventChannel::new();
            let mut rx = channel.subscribe();
            drop(channel);
            assert_eq!(rx.recv().await, None);
        }
    }
}
