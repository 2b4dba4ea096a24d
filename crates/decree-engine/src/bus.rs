//! Event bus
//!
//! Subscribers attach to one of the four channels and receive every event
//! the engine emits there during a run. Subscription handles carry their
//! own identity, so the same closure can be attached and detached without
//! affecting other subscribers.

use decree_core::{Channel, EngineEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A channel subscriber
pub type Subscriber = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Dispatches engine events to channel subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<Channel, Vec<Subscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber to a channel
    pub fn on<F>(&self, channel: Channel, subscriber: F) -> Subscription
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        self.subscribe(channel, Arc::new(subscriber))
    }

    /// Attach an already-shared subscriber; attaching the same handle to
    /// the same channel twice is a no-op
    pub fn subscribe(&self, channel: Channel, subscriber: Subscriber) -> Subscription {
        {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            let subscribers = channels.entry(channel).or_default();
            if !subscribers.iter().any(|s| Arc::ptr_eq(s, &subscriber)) {
                subscribers.push(Arc::clone(&subscriber));
            }
        }
        Subscription {
            bus: self.clone(),
            channel,
            subscriber,
        }
    }

    /// Detach a subscriber by handle identity
    pub fn off(&self, channel: Channel, subscriber: &Subscriber) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(subscribers) = channels.get_mut(&channel) {
            subscribers.retain(|s| !Arc::ptr_eq(s, subscriber));
        }
    }

    /// Deliver an event to its channel's subscribers
    ///
    /// The subscriber list is snapshotted before delivery, so a subscriber
    /// may detach itself or others mid-event.
    pub fn emit(&self, event: impl Into<EngineEvent>) {
        let event = event.into();
        let subscribers: Vec<Subscriber> = {
            let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            channels
                .get(&event.channel())
                .map(|subscribers| subscribers.to_vec())
                .unwrap_or_default()
        };
        for subscriber in subscribers {
            subscriber(&event);
        }
    }
}

/// Handle for detaching a subscriber
pub struct Subscription {
    bus: EventBus,
    channel: Channel,
    subscriber: Subscriber,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.bus.off(self.channel, &self.subscriber);
    }
}
