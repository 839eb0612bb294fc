//! Fuzz target: `mqtt::handle_inbound`
//!
//! The first byte picks the topic, the rest is the payload. Whatever
//! arrives, the shared state stays in range and a rejected payload
//! leaves it untouched.
//!
//! cargo fuzz run fuzz_inbound

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermofan::adapters::mqtt::{handle_inbound, TOPIC_COMMAND, TOPIC_CONFIG, TOPIC_STATUS};
use thermofan::app::state::{SharedState, SPEED_MAX, THRESHOLD_MAX_C, THRESHOLD_MIN_C};
use thermofan::events::EventQueue;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let topic = match selector % 3 {
        0 => TOPIC_COMMAND,
        1 => TOPIC_CONFIG,
        _ => TOPIC_STATUS,
    };

    let state = SharedState::default();
    let events: EventQueue<4> = EventQueue::new();
    let before = state.snapshot();

    if handle_inbound(topic, payload, &state, &events).is_err() {
        assert_eq!(state.snapshot(), before, "rejected payload changed state");
        assert!(events.is_empty());
    }

    let after = state.snapshot();
    assert!(after.manual_speed() <= SPEED_MAX);
    assert!(after.max_speed() <= SPEED_MAX);
    assert!((THRESHOLD_MIN_C..=THRESHOLD_MAX_C).contains(&after.temp_threshold()));
});
