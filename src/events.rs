//! Task-level event queue.
//!
//! Events are produced by:
//! - the control timer (periodic cycle)
//! - the MQTT task (a message changed something the control task must act on)
//!
//! and consumed by the control task. Encoder input does not come through
//! here: it is produced in interrupt context and travels over the lock-free
//! [`InputQueue`](crate::drivers::encoder::InputQueue) instead.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ esp_timer   │────▶│  Event Queue │────▶│ Control task │
//! │ MQTT task   │────▶│ (embassy ch) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Control period elapsed: measure, decide, actuate, publish.
    ControlTick,
    /// Mode or manual speed changed outside the control task.
    Republish,
    /// Threshold or ceiling changed; persist once things settle.
    SettingsChanged,
}

/// Bounded MPMC queue that counts what it had to drop.
pub struct EventQueue<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, Event, N>,
    dropped: AtomicU32,
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self { channel: Channel::new(), dropped: AtomicU32::new(0) }
    }

    /// Returns `false` if the queue is full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        if self.channel.try_send(event).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn pop(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, FIFO.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub static EVENTS: EventQueue<EVENT_QUEUE_CAP> = EventQueue::new();

/// Push onto the global queue.
pub fn push_event(event: Event) -> bool {
    EVENTS.push(event)
}
