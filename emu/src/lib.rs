//! Bus, interrupt plumbing and devices for a small virtual machine, built
//! around a 16450 UART.

pub mod bus;
pub mod error;
pub mod input;
pub mod irq;
pub mod plic;
pub mod ram;
pub mod sink;
pub mod uart;
