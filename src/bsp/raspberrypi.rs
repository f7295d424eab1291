// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2018-2023 Andre Richter <andre.o.richter@gmail.com>

//! Top-level BSP file for the Raspberry Pi 3 and 4.

pub mod memory;

use super::device_driver;
use crate::gpio_irq;

//--------------------------------------------------------------------------------------------------
// Global instances
//--------------------------------------------------------------------------------------------------

static GPIO_EVENT: device_driver::GpioEvent =
    unsafe { device_driver::GpioEvent::new(memory::map::mmio::GPIO_START) };

static PIN_DISPATCHER: gpio_irq::GpioIrqDispatcher<&'static device_driver::GpioEvent> =
    gpio_irq::GpioIrqDispatcher::new(&GPIO_EVENT);

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Board identification.
pub fn board_name() -> &'static str {
    #[cfg(feature = "bsp_rpi3")]
    {
        "Raspberry Pi 3"
    }

    #[cfg(feature = "bsp_rpi4")]
    {
        "Raspberry Pi 4"
    }
}

/// Return a reference to the GPIO event-detect driver.
pub fn gpio_event() -> &'static device_driver::GpioEvent {
    &GPIO_EVENT
}

/// Return a reference to the board's GPIO interrupt dispatcher.
pub fn pin_dispatcher() -> &'static gpio_irq::GpioIrqDispatcher<&'static device_driver::GpioEvent> {
    &PIN_DISPATCHER
}
