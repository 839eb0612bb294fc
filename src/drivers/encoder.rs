//! Rotary encoder with push switch.
//!
//! Phase A interrupts on both edges; only the rising edge counts as a
//! detent, and phase B sampled at that moment gives the direction (B high =
//! clockwise = [`EncoderEvent::Increment`]). The switch interrupts on its
//! falling edge. No debouncing; a bouncing contact yields extra events.
//!
//! ## ISR contract
//!
//! The handlers run in interrupt context. They touch only the decoder's
//! atomic and the lock-free [`InputQueue`], never the shared control state.
//! When the queue is full the event is dropped and counted.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::mpmc::Q32;

/// One decoded user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderEvent {
    Increment,
    Decrement,
    ButtonPress,
}

// ── Quadrature decoding ───────────────────────────────────────

/// Edge detector for phase A.
pub struct QuadratureDecoder {
    last_phase_a: AtomicBool,
}

impl QuadratureDecoder {
    pub const fn new() -> Self {
        Self { last_phase_a: AtomicBool::new(false) }
    }

    /// Record the current phase A level without producing an event.
    pub fn seed(&self, phase_a: bool) {
        self.last_phase_a.store(phase_a, Ordering::Release);
    }

    /// Feed a phase A edge with both levels sampled in the interrupt.
    pub fn on_phase_a_edge(&self, phase_a: bool, phase_b: bool) -> Option<EncoderEvent> {
        let previous = self.last_phase_a.swap(phase_a, Ordering::AcqRel);
        if previous || !phase_a {
            return None;
        }
        Some(if phase_b { EncoderEvent::Increment } else { EncoderEvent::Decrement })
    }
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── ISR → control task queue ──────────────────────────────────

/// Multi-producer queue safe to fill from interrupt context.
pub struct InputQueue {
    queue: Q32<EncoderEvent>,
    dropped: AtomicU32,
}

impl InputQueue {
    pub const fn new() -> Self {
        Self { queue: Q32::new(), dropped: AtomicU32::new(0) }
    }

    /// Returns `false` and counts the loss when the queue is full.
    pub fn push(&self, event: EncoderEvent) -> bool {
        if self.queue.enqueue(event).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    pub fn pop(&self) -> Option<EncoderEvent> {
        self.queue.dequeue()
    }

    /// Events lost to a full queue since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub static DECODER: QuadratureDecoder = QuadratureDecoder::new();
pub static INPUT_EVENTS: InputQueue = InputQueue::new();

/// Called from the phase A GPIO interrupt.
pub fn phase_a_isr_handler(phase_a: bool, phase_b: bool) {
    if let Some(event) = DECODER.on_phase_a_edge(phase_a, phase_b) {
        INPUT_EVENTS.push(event);
    }
}

/// Called from the switch GPIO interrupt.
pub fn button_isr_handler() {
    INPUT_EVENTS.push(EncoderEvent::ButtonPress);
}
