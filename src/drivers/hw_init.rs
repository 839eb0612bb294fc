//! One-shot hardware peripheral initialization.
//!
//! Configures the encoder inputs and the fan's LEDC timer/channel using raw
//! ESP-IDF sys calls, and installs the encoder interrupt handlers. Called
//! once from `main()` before the control task starts. The 1-Wire line is
//! configured separately through esp-idf-hal's open-drain pin driver.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any task is spawned.
    unsafe {
        init_encoder_inputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_encoder_inputs() -> Result<(), HwInitError> {
    let inputs = [
        (pins::ENCODER_A_GPIO, gpio_int_type_t_GPIO_INTR_ANYEDGE),
        (pins::ENCODER_B_GPIO, gpio_int_type_t_GPIO_INTR_DISABLE),
        (pins::ENCODER_BUTTON_GPIO, gpio_int_type_t_GPIO_INTR_NEGEDGE),
    ];

    for (pin, intr_type) in inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    }

    info!("hw_init: encoder inputs configured (A={}, B={}, SW={})",
        pins::ENCODER_A_GPIO, pins::ENCODER_B_GPIO, pins::ENCODER_BUTTON_GPIO);
    Ok(())
}

// ── LEDC PWM ─────────────────────────────────────────────────

pub const LEDC_CH_FAN: u32 = 0;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    // Timer 0: fan (25 kHz, 8-bit)
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_8_BIT,
        freq_hz: pins::FAN_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer0) };
    if ret != ESP_OK as i32 { return Err(HwInitError::LedcInitFailed(ret)); }

    // Channel 0: fan PWM, starts stopped
    let ret = unsafe { ledc_channel_config(&ledc_channel_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        channel: LEDC_CH_FAN,
        timer_sel: ledc_timer_t_LEDC_TIMER_0,
        gpio_num: pins::FAN_PWM_GPIO,
        duty: 0,
        hpoint: 0,
        ..Default::default()
    }) };
    if ret != ESP_OK as i32 { return Err(HwInitError::LedcInitFailed(ret)); }

    info!("hw_init: LEDC configured (fan=CH0 @ {} Hz)", pins::FAN_PWM_FREQ_HZ);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: the LEDC channel was configured in init_ledc(); only the
    // control task writes duty registers.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty as u32);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
use crate::drivers::encoder::{button_isr_handler, phase_a_isr_handler, DECODER};

#[cfg(target_os = "espidf")]
unsafe extern "C" fn encoder_a_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: gpio_get_level is a register read; safe in ISR context.
    let a = unsafe { gpio_get_level(pins::ENCODER_A_GPIO) } != 0;
    let b = unsafe { gpio_get_level(pins::ENCODER_B_GPIO) } != 0;
    phase_a_isr_handler(a, b);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn encoder_button_isr(_arg: *mut core::ffi::c_void) {
    button_isr_handler();
}

/// Install per-pin GPIO ISR service and register the encoder handlers.
/// Call after init_peripherals().
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service was already installed
    // (acceptable). The handlers only touch atomics and the lock-free input
    // queue.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Seed the decoder so the first edge is judged against the real level.
        DECODER.seed(gpio_get_level(pins::ENCODER_A_GPIO) != 0);

        gpio_isr_handler_add(pins::ENCODER_A_GPIO, Some(encoder_a_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::ENCODER_A_GPIO);

        gpio_isr_handler_add(pins::ENCODER_BUTTON_GPIO, Some(encoder_button_isr), core::ptr::null_mut());
        gpio_intr_enable(pins::ENCODER_BUTTON_GPIO);

        info!("hw_init: ISR service installed (encoder A, switch)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
