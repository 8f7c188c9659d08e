//! Core logic for the matrix-snake firmware.
//!
//! Everything in here is hardware-free and runs on the host under
//! `cargo test`; the firmware binary (`main.rs`, behind the `pico` feature)
//! wires these pieces to the Pico's timer, UART, ADC, PWM and watchdog.

#![cfg_attr(not(test), no_std)]

pub mod bitfield;
pub mod brightness;
pub mod game;
pub mod input;
pub mod liveness;
pub mod scan;
pub mod status;
