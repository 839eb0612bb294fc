//! Control-period timer using ESP-IDF's esp_timer API.
//!
//! A periodic timer pushes [`Event::ControlTick`] into the task event
//! queue. The callback runs in the esp_timer task (not an ISR), so taking
//! the queue's critical section there is fine.
//!
//! On host targets a plain thread does the same with `thread::sleep`.

use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
static mut CONTROL_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    if !push_event(Event::ControlTick) {
        log::warn!("hw_timer: event queue full, control tick dropped");
    }
}

/// Start the periodic control timer.
#[cfg(target_os = "espidf")]
pub fn start_control_timer(period_ms: u32) {
    // SAFETY: CONTROL_TIMER is written here once at boot from the main task
    // before the callback can fire.
    unsafe {
        let args = esp_timer_create_args_t {
            callback: Some(control_tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"control\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&args, &raw mut CONTROL_TIMER);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer create failed (rc={}), no periodic cycles", ret);
            return;
        }
        let ret = esp_timer_start_periodic(CONTROL_TIMER, u64::from(period_ms) * 1_000);
        if ret != ESP_OK {
            log::error!("hw_timer: control timer start failed (rc={})", ret);
            return;
        }
    }
    log::info!("hw_timer: control tick every {} ms", period_ms);
}

#[cfg(not(target_os = "espidf"))]
pub fn start_control_timer(period_ms: u32) {
    let period = std::time::Duration::from_millis(u64::from(period_ms));
    let spawned = std::thread::Builder::new()
        .name("control-timer".into())
        .spawn(move || loop {
            std::thread::sleep(period);
            push_event(Event::ControlTick);
        });
    match spawned {
        Ok(_) => log::info!("hw_timer(sim): control tick every {} ms", period_ms),
        Err(e) => log::error!("hw_timer(sim): timer thread spawn failed: {}", e),
    }
}
