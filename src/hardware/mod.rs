//! Raspberry Pi peripherals
//!
//! Implementations of [`AxisSource`](crate::joystick::AxisSource) and
//! [`ButtonSource`](crate::button::ButtonSource) on top of `rppal`.

pub mod ads1115;
pub mod gpio;

pub use ads1115::Ads1115;
pub use gpio::GpioButton;
