// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2020-2023 Andre Richter <andre.o.richter@gmail.com>

//! Per-pin dispatch of GPIO interrupt events.
//!
//! All GPIO pins share one interrupt source at the top-level interrupt controller, so a level of
//! indirection is needed to handle events for particular pins. This module supplies it: clients
//! register one handler per pin, and the dispatcher registers a single callback for the shared
//! source that reads the pending-event bitmask and fans out to the per-pin handlers in ascending
//! pin order.
//!
//! A pin's pending latch is cleared *before* its handler runs. With edge-triggered events, a
//! re-trigger that arrives while the handler is still executing therefore sets the latch again
//! and is delivered on the next round instead of being lost.
//!
//! The handler table is shared between the foreground flow of execution (registration) and
//! interrupt context (dispatch). All table access goes through an IRQ-masking lock, so a
//! registration can never be observed torn. Which handler an event that is already in flight
//! observes - the old or the new one - remains unspecified.

use crate::{
    exception, synchronization,
    synchronization::IRQSafeNullLock,
};
use core::fmt;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// GPIO interrupt dispatch interfaces.
pub mod interface {
    use crate::exception;

    /// Implemented by types that handle events for a single GPIO pin.
    ///
    /// The handler object is the registrant's context: any state the handler needs lives in the
    /// implementing type, and dispatch delivers it back via `&self`. Handlers run in interrupt
    /// context and must be quick.
    pub trait PinHandler {
        /// Called once per delivered event on the handler's pin.
        ///
        /// `interrupted_addr` is the address of the instruction that was preempted by the
        /// interrupt, as captured by the exception entry code.
        fn handle(&self, interrupted_addr: usize);
    }

    /// The register-level view of the GPIO event-detect hardware.
    ///
    /// One bit per pin, across however many banks the hardware splits the pins into.
    pub trait PinEventSource {
        /// The coalesced pending bitmask. Bit `n` set means pin `n` holds an unacknowledged
        /// event. Bits at and above [`super::PinNumber::NUM`] must be clear.
        fn pending_bitmask(&self) -> u64;

        /// Acknowledge the event latched for `pin`.
        fn clear_pending(&self, pin: super::PinNumber);
    }

    /// A shared reference to an event source is itself an event source. This is what lets a
    /// dispatcher in a `static` borrow a driver living in another `static`.
    impl<T: PinEventSource + ?Sized> PinEventSource for &T {
        fn pending_bitmask(&self) -> u64 {
            (**self).pending_bitmask()
        }

        fn clear_pending(&self, pin: super::PinNumber) {
            (**self).clear_pending(pin)
        }
    }

    /// The callback shape the dispatcher registers for the shared GPIO source.
    pub trait SourceHandler {
        /// Called by the interrupt controller when the shared GPIO source asserts.
        ///
        /// Takes an `IRQContext` token to ensure it can only be called from IRQ context.
        fn handle_pending_events<'irq_context>(
            &'irq_context self,
            interrupted_addr: usize,
            ic: &exception::asynchronous::IRQContext<'irq_context>,
        );
    }

    /// The top-level interrupt controller, reduced to the one source this module cares about:
    /// the coalesced GPIO event.
    pub trait IrqController {
        /// Install `handler` as the handler for the shared GPIO source. Called once per
        /// dispatcher initialization.
        fn register_source_handler(
            &self,
            handler: &'static (dyn SourceHandler + Sync),
        ) -> Result<(), &'static str>;

        /// Unmask the shared GPIO source.
        fn enable_source(&self);

        /// Mask the shared GPIO source.
        fn disable_source(&self);
    }
}

/// A GPIO pin number with integrated range sanity check.
#[derive(Copy, Clone)]
pub struct PinNumber(usize);

/// The dispatcher for the shared GPIO interrupt source.
///
/// One instance owns the event-source collaborator, the fixed-size handler table and the enabled
/// flag. The instance must live in a `static`, since the interrupt controller holds on to its
/// callback for the rest of the process lifetime.
pub struct GpioIrqDispatcher<S: interface::PinEventSource + Sync> {
    source: S,
    state: IRQSafeNullLock<DispatchState>,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

type HandlerTable = [&'static (dyn interface::PinHandler + Sync); PinNumber::NUM];

struct DispatchState {
    table: HandlerTable,
    controller: Option<&'static (dyn interface::IrqController + Sync)>,
    enabled: bool,
}

/// Wrapper struct for a bitmask indicating pending pin events. Iterates in ascending pin order.
struct PendingPins {
    bitmask: u64,
}

/// The no-op sentinel. Every table slot holds it until a client registers something else.
struct NoOpHandler;

// A `const` rather than a `static` so that the IRQ-masked table can be built in const context.
// The referent is a single anonymous allocation, so sentinel slots are recognizable by address.
const NO_OP_HANDLER: &(dyn interface::PinHandler + Sync) = &NoOpHandler;

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl interface::PinHandler for NoOpHandler {
    fn handle(&self, _interrupted_addr: usize) {}
}

impl PendingPins {
    pub fn new(bitmask: u64) -> Self {
        Self { bitmask }
    }
}

impl Iterator for PendingPins {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.bitmask.trailing_zeros();
        if next == 64 {
            return None;
        }

        self.bitmask &= !(1 << next);

        Some(next as usize)
    }
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// The default handler for GPIO pin events. Performs no observable action.
///
/// Provided as a reference point for what a freshly initialized table contains, and as the
/// deregistration sentinel: registering it returns a pin to default behavior.
pub fn default_handler() -> &'static (dyn interface::PinHandler + Sync) {
    NO_OP_HANDLER
}

impl PinNumber {
    /// The highest valid pin number.
    pub const MAX_INCLUSIVE: usize = 53;

    /// Number of pins, aka the handler table size.
    pub const NUM: usize = Self::MAX_INCLUSIVE + 1;

    /// Creates a new instance if `number <= MAX_INCLUSIVE`.
    ///
    /// An out-of-range number is a programming error and fatal.
    pub const fn new(number: usize) -> Self {
        assert!(number <= Self::MAX_INCLUSIVE);

        Self(number)
    }

    /// Return the wrapped number.
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for PinNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------------------------------------------------------------------------
// OS Interface Code
//------------------------------------------------------------------------------
use synchronization::interface::Mutex;

impl<S: interface::PinEventSource + Sync> GpioIrqDispatcher<S> {
    /// Create an instance. All pins start on the no-op sentinel and dispatch starts disabled.
    pub const fn new(source: S) -> Self {
        Self {
            source,
            state: IRQSafeNullLock::new(DispatchState {
                table: [NO_OP_HANDLER; PinNumber::NUM],
                controller: None,
                enabled: false,
            }),
        }
    }

    /// Required initialization. Must be called before any other dispatcher operation.
    ///
    /// Resets the handler table to the no-op sentinel for every pin, masks the shared GPIO source
    /// at `controller`, and registers the dispatch callback with it. Calling it again re-runs the
    /// reset: all registrations are dropped and dispatch is disabled until the next
    /// [`Self::enable`].
    ///
    /// # Panics
    ///
    /// If the controller refuses the callback registration.
    pub fn init(&'static self, controller: &'static (dyn interface::IrqController + Sync)) {
        let mut r = &self.state;
        r.lock(|state| {
            state.table = [NO_OP_HANDLER; PinNumber::NUM];
            state.enabled = false;
            state.controller = Some(controller);
        });

        // Events stay masked until the client explicitly calls enable().
        controller.disable_source();

        if let Err(msg) = controller.register_source_handler(self) {
            panic!("GpioIrqDispatcher: registering the source handler failed: {}", msg);
        }
    }

    /// Global enable for GPIO event dispatch. Idempotent.
    pub fn enable(&self) {
        let mut r = &self.state;
        r.lock(|state| {
            let controller = match state.controller {
                Some(controller) => controller,
                None => panic!("GpioIrqDispatcher: enable() before init()"),
            };

            controller.enable_source();
            state.enabled = true;
        })
    }

    /// Global disable for GPIO event dispatch. Idempotent.
    pub fn disable(&self) {
        let mut r = &self.state;
        r.lock(|state| {
            let controller = match state.controller {
                Some(controller) => controller,
                None => panic!("GpioIrqDispatcher: disable() before init()"),
            };

            controller.disable_source();
            state.enabled = false;
        })
    }

    /// Whether dispatch is currently enabled.
    pub fn is_enabled(&self) -> bool {
        let mut r = &self.state;
        r.lock(|state| state.enabled)
    }

    /// Register `handler` for events on `pin`.
    ///
    /// Each pin has exactly one handler; further dispatch must be done by the handler itself. A
    /// prior registration is overwritten unconditionally - last write wins. Registering
    /// [`default_handler`] returns the pin to default behavior.
    ///
    /// The overwrite gives no signal if an event for `pin` is concurrently in flight; whether
    /// such an event sees the old or the new handler is unspecified. Callers that need certainty
    /// bracket the registration with [`Self::disable`] / [`Self::enable`].
    pub fn register_handler(
        &self,
        pin: PinNumber,
        handler: &'static (dyn interface::PinHandler + Sync),
    ) {
        let mut r = &self.state;
        r.lock(|state| {
            assert!(
                state.controller.is_some(),
                "GpioIrqDispatcher: register_handler() before init()"
            );

            state.table[pin.get()] = handler;
        })
    }

    /// Visit every pin whose table slot holds something other than the no-op sentinel.
    pub fn registered_pins(&self, mut visit: impl FnMut(PinNumber)) {
        let mut r = &self.state;
        r.lock(|state| {
            for (i, handler) in state.table.iter().enumerate() {
                let is_default = core::ptr::addr_eq(
                    *handler as *const (dyn interface::PinHandler + Sync),
                    NO_OP_HANDLER as *const (dyn interface::PinHandler + Sync),
                );

                if !is_default {
                    visit(PinNumber::new(i));
                }
            }
        })
    }
}

impl<S: interface::PinEventSource + Sync> interface::SourceHandler for GpioIrqDispatcher<S> {
    fn handle_pending_events<'irq_context>(
        &'irq_context self,
        interrupted_addr: usize,
        _ic: &exception::asynchronous::IRQContext<'irq_context>,
    ) {
        let pending = PendingPins::new(self.source.pending_bitmask());

        let mut r = &self.state;
        r.lock(|state| {
            for number in pending {
                let pin = PinNumber::new(number);

                // Clear first. An edge re-trigger during handler execution sets the latch again
                // and is picked up by the next round.
                self.source.clear_pending(pin);

                state.table[pin.get()].handle(interrupted_addr);
            }
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------
