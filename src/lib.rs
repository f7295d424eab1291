// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2018-2023 Andre Richter <andre.o.richter@gmail.com>

// Rust embedded logo for `make doc`.
#![doc(html_logo_url = "https://git.io/JeGIp")]

//! The `mango` library.
//!
//! A thin hardware abstraction layer for bare-metal Raspberry Pi boards, providing two services
//! directly on top of the memory-mapped peripherals:
//!
//! - A pixel framebuffer with single- or double-buffered display, negotiated with the firmware
//!   over a [`display::interface::DisplayChannel`].
//! - Per-pin dispatch of GPIO interrupt events that all arrive over one shared interrupt source,
//!   fanned out by the [`gpio_irq::GpioIrqDispatcher`].
//!
//! The crate is a library only. Boot code, the exception vector trampoline, the top-level
//! interrupt controller and the panic handler are supplied by the kernel or firmware image that
//! links it.
//!
//! # Code organization
//!
//! `src/` contains the board- and architecture-agnostic core. Processor-specific code lives in
//! `src/_arch/<arch>/` and is inserted into the module tree with `#[path]` attributes, so that,
//! for example, `crate::exception::asynchronous::local_irq_mask()` resolves to the right
//! implementation for the compilation target. Board support resides in `src/bsp/`, selected with
//! the `bsp_rpi3`/`bsp_rpi4` cargo features.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod bsp;
pub mod display;
pub mod driver;
pub mod exception;
pub mod gpio_irq;
pub mod synchronization;
