//! Interrupt driven unix time base for the ATMega328p.
//!
//! TC2 runs from the 32.768 kHz watch crystal in asynchronous mode, so the
//! seconds keep counting even while the CPU clock is stopped. Each counter
//! overflow advances a shared seconds count and raises a once-per-second
//! signal for the main loop.

#![no_std]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]

pub mod ticktimer;
pub mod timebase;
pub mod timesync;

pub use ticktimer::{ClockSource, Error, Prescale, TickTimer, TimerConfig};
pub use timebase::{timebase, TimeBase};
pub use timesync::SyncParser;
