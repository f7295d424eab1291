// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2018-2023 Andre Richter <andre.o.richter@gmail.com>

//! GPIO event-detect driver.
//!
//! Covers the event-detect portion of the BCM283x GPIO block: the per-pin event-detect status
//! latches (GPEDS), which back the dispatcher's pending bitmask, and the per-pin detect-enable
//! registers (GPREN/GPFEN/GPHEN/GPLEN) that select which signal conditions a pin latches.
//!
//! The 54 pins are spread over two 32-bit register banks; pins 0..=31 live in bank 0, the rest in
//! bank 1. GPEDS is write-1-to-clear.

use crate::{
    bsp::device_driver::common::MMIODerefWrapper,
    driver, gpio_irq,
    gpio_irq::PinNumber,
    synchronization,
    synchronization::IRQSafeNullLock,
};
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_structs,
    registers::ReadWrite,
};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

// GPIO registers.
//
// Descriptions taken from
// https://github.com/raspberrypi/documentation/files/1888662/BCM2837-ARM-Peripherals.-.Revised.-.V2-1.pdf
register_structs! {
    #[allow(non_snake_case)]
    EventStatusRegisterBlock {
        (0x00 => _reserved1),
        (0x40 => GPEDS0: ReadWrite<u32>),
        (0x44 => GPEDS1: ReadWrite<u32>),
        (0x48 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    DetectEnableRegisterBlock {
        (0x00 => _reserved1),
        (0x4c => GPREN0: ReadWrite<u32>),
        (0x50 => GPREN1: ReadWrite<u32>),
        (0x54 => _reserved2),
        (0x58 => GPFEN0: ReadWrite<u32>),
        (0x5c => GPFEN1: ReadWrite<u32>),
        (0x60 => _reserved3),
        (0x64 => GPHEN0: ReadWrite<u32>),
        (0x68 => GPHEN1: ReadWrite<u32>),
        (0x6c => _reserved4),
        (0x70 => GPLEN0: ReadWrite<u32>),
        (0x74 => GPLEN1: ReadWrite<u32>),
        (0x78 => @END),
    }
}

/// Abstraction for the event-detect status part of the associated MMIO registers.
type EventStatusRegisters = MMIODerefWrapper<EventStatusRegisterBlock>;

/// Abstraction for the detect-enable part of the associated MMIO registers.
type DetectEnableRegisters = MMIODerefWrapper<DetectEnableRegisterBlock>;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// The signal conditions a pin can latch an event for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinEvent {
    /// A low-to-high transition.
    RisingEdge,
    /// A high-to-low transition.
    FallingEdge,
    /// The pin reads high.
    HighLevel,
    /// The pin reads low.
    LowLevel,
}

/// Representation of the GPIO event-detect hardware.
pub struct GpioEvent {
    /// Status latches. Reads are unguarded, and clearing is write-1-to-clear, so no
    /// read-modify-write is needed there either.
    status: EventStatusRegisters,

    /// Detect-enable configuration is read-modify-write and therefore guarded with a lock.
    detect: IRQSafeNullLock<DetectEnableRegisters>,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------
use synchronization::interface::Mutex;

impl GpioEvent {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - The user must ensure to provide a correct MMIO start address.
    pub const unsafe fn new(mmio_start_addr: usize) -> Self {
        Self {
            status: EventStatusRegisters::new(mmio_start_addr),
            detect: IRQSafeNullLock::new(DetectEnableRegisters::new(mmio_start_addr)),
        }
    }

    /// Start latching events of the given kind on `pin`.
    pub fn enable_event_detection(&self, pin: PinNumber, event: PinEvent) {
        self.modify_detect_enable(pin, event, true)
    }

    /// Stop latching events of the given kind on `pin`. An already latched event stays pending.
    pub fn disable_event_detection(&self, pin: PinNumber, event: PinEvent) {
        self.modify_detect_enable(pin, event, false)
    }

    fn modify_detect_enable(&self, pin: PinNumber, event: PinEvent, enable: bool) {
        let mut r = &self.detect;
        r.lock(|regs| {
            let (bank0, bank1) = match event {
                PinEvent::RisingEdge => (&regs.GPREN0, &regs.GPREN1),
                PinEvent::FallingEdge => (&regs.GPFEN0, &regs.GPFEN1),
                PinEvent::HighLevel => (&regs.GPHEN0, &regs.GPHEN1),
                PinEvent::LowLevel => (&regs.GPLEN0, &regs.GPLEN1),
            };

            let reg = if pin.get() <= 31 { bank0 } else { bank1 };
            let bit: u32 = 1 << (pin.get() % 32);

            if enable {
                reg.set(reg.get() | bit);
            } else {
                reg.set(reg.get() & !bit);
            }
        })
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------

impl driver::interface::DeviceDriver for GpioEvent {
    fn compatible(&self) -> &'static str {
        "BCM GPIO Event Detect"
    }

    unsafe fn init(&self) -> Result<(), &'static str> {
        // Acknowledge anything latched before we were handed the hardware.
        self.status.GPEDS0.set(u32::MAX);
        self.status.GPEDS1.set(u32::MAX);

        Ok(())
    }
}

impl gpio_irq::interface::PinEventSource for GpioEvent {
    fn pending_bitmask(&self) -> u64 {
        let pending = (u64::from(self.status.GPEDS1.get()) << 32)
            | u64::from(self.status.GPEDS0.get());

        // Bits above the last pin are reserved reads.
        pending & ((1 << PinNumber::NUM) - 1)
    }

    fn clear_pending(&self, pin: PinNumber) {
        let status_reg = if pin.get() <= 31 {
            &self.status.GPEDS0
        } else {
            &self.status.GPEDS1
        };

        // Writing a 1 to a bit clears the corresponding latch. All other latches are unaffected,
        // so no read and OR'ing here.
        status_reg.set(1 << (pin.get() % 32));
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
