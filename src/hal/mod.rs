//! ESP32 hardware abstraction.
//!
//! Thin wrappers over esp-idf-svc. Everything above this layer is
//! platform-independent and tested on host.

pub mod display;
pub mod mqtt;
pub mod pulse_input;
pub mod wifi;

use esp_idf_svc::sys;

/// Free heap in bytes.
pub fn free_heap() -> u32 {
    // SAFETY: Plain query, callable from any task
    unsafe { sys::esp_get_free_heap_size() }
}

/// Hardware RNG word.
pub fn random_u32() -> u32 {
    // SAFETY: Plain query, callable from any task
    unsafe { sys::esp_random() }
}
