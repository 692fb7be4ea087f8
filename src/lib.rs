//! Pushbutton press classifier (short, long, double) driving a blinking LED, reported to a host
//! over RS-485.
//!
//! Everything here is hardware independent and works on `embedded-hal` pins and serial ports;
//! the firmware in `main.rs` wires it to an STM32F103.

#![cfg_attr(not(test), no_std)]

pub mod button;
pub mod comm;
pub mod dispatch;
pub mod led;
pub mod time;

pub use button::{Classifier, Press};
pub use time::Millis;
