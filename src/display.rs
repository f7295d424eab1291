// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2020-2023 Andre Richter <andre.o.richter@gmail.com>

//! Pixel framebuffer with single- or double-buffered display.
//!
//! Display geometry and the pixel buffer addresses are owned by the GPU firmware and must be
//! negotiated over a firmware-mediated request/response channel. This module contains the
//! board-agnostic controller logic on top of that channel: it stores the negotiated configuration,
//! tracks which buffer currently holds the draw role, and relays swap requests.
//!
//! In single-buffered mode there is one buffer that is on-screen at all times; clients draw into
//! it and every store is immediately visible. In double-buffered mode the client draws into the
//! off-screen buffer and calls [`FrameBuffer::swap_buffer`] to bring the finished frame on-screen
//! in one update.

use core::{fmt, mem};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Framebuffer interfaces.
pub mod interface {
    use super::{BufferAllocation, DisplayMode, NegotiationError};

    /// The firmware-mediated display negotiation channel.
    ///
    /// Both operations are synchronous round-trips to the firmware and block the calling context
    /// until the firmware answers. There are no timeouts at this layer.
    ///
    /// Implementors encode requests for the actual transport, for example the VideoCore property
    /// mailbox. The wire encoding is outside the scope of this crate.
    pub trait DisplayChannel {
        /// Ask the firmware for a framebuffer with the given geometry.
        ///
        /// `depth` is in bytes per pixel. In [`DisplayMode::Double`], the firmware must provide
        /// two buffers of `pitch * height` bytes each; the returned allocation names which one is
        /// initially on-screen.
        fn negotiate(
            &mut self,
            width: usize,
            height: usize,
            depth: usize,
            mode: DisplayMode,
        ) -> Result<BufferAllocation, NegotiationError>;

        /// Ask the firmware to scan out the buffer at `addr` from the next refresh on.
        ///
        /// `addr` is one of the addresses previously returned by [`Self::negotiate`]. Whether the
        /// change is applied aligned to a blanking interval is up to the firmware; this layer only
        /// requires best effort.
        fn set_visible_address(&mut self, addr: usize) -> Result<(), NegotiationError>;
    }
}

/// Buffering mode of the display.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayMode {
    /// One buffer, permanently on-screen.
    Single,
    /// Two buffers with alternating on-screen/draw roles.
    Double,
}

/// Negotiation channel failures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NegotiationError {
    /// The firmware cannot satisfy the requested geometry/depth combination.
    UnsupportedConfiguration,
    /// The request/response round-trip itself failed.
    ChannelFault,
}

/// What a successful negotiation returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferAllocation {
    /// Address of the buffer that is on-screen after negotiation.
    pub visible: usize,

    /// Address of the off-screen buffer. `None` in single-buffered mode.
    pub offscreen: Option<usize>,

    /// Bytes per pixel row. May exceed `width * depth` if the firmware pads rows.
    pub pitch: usize,
}

/// The negotiated display geometry. All fields are fixed for the lifetime of one initialization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    /// Width in pixels.
    pub width: usize,

    /// Height in pixels.
    pub height: usize,

    /// Bytes per pixel.
    pub depth: usize,

    /// Bytes per row, `>= width * depth`.
    pub pitch: usize,
}

/// The framebuffer controller.
///
/// Created by [`FrameBuffer::init`] and alive until the process terminates; there is no teardown.
/// The controller holds no internal lock. [`FrameBuffer::swap_buffer`] is a blocking round-trip to
/// the firmware, so concurrent use from two execution contexts requires external serialization,
/// which the `&mut self` receivers enforce for safe code.
pub struct FrameBuffer<C: interface::DisplayChannel> {
    channel: C,
    config: DisplayConfig,
    mode: DisplayMode,
    buffers: BufferSet,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

/// The on-screen/draw role assignment. In single-buffered mode both addresses are equal and the
/// roles never move. In double-buffered mode the two roles are mutually exclusive and flip only as
/// a unit, in [`FrameBuffer::swap_buffer`].
struct BufferSet {
    onscreen: usize,
    draw: usize,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NegotiationError::UnsupportedConfiguration => {
                write!(f, "unsupported display configuration")
            }
            NegotiationError::ChannelFault => write!(f, "negotiation channel fault"),
        }
    }
}

impl<C: interface::DisplayChannel> FrameBuffer<C> {
    /// Negotiate geometry and buffer addresses and return the initialized controller.
    ///
    /// `depth` is in bytes per pixel. Returning the controller from here is what makes "accessor
    /// called before init" unrepresentable.
    ///
    /// # Panics
    ///
    /// A configuration the firmware cannot satisfy, a channel fault, or an allocation that
    /// violates the negotiated contract (missing second buffer, pitch smaller than a pixel row)
    /// is fatal. The module provides no recoverable-error path.
    pub fn init(mut channel: C, width: usize, height: usize, depth: usize, mode: DisplayMode) -> Self {
        let alloc = match channel.negotiate(width, height, depth, mode) {
            Ok(alloc) => alloc,
            Err(e) => panic!(
                "FrameBuffer: negotiating {}x{}, {} bytes/pixel failed: {}",
                width, height, depth, e
            ),
        };

        assert!(
            alloc.pitch >= width * depth,
            "FrameBuffer: negotiated pitch {} is smaller than a pixel row",
            alloc.pitch
        );

        let buffers = match (mode, alloc.offscreen) {
            (DisplayMode::Single, None) => BufferSet {
                onscreen: alloc.visible,
                draw: alloc.visible,
            },
            (DisplayMode::Double, Some(offscreen)) => {
                assert!(
                    offscreen != alloc.visible,
                    "FrameBuffer: firmware returned one buffer for both roles"
                );

                BufferSet {
                    onscreen: alloc.visible,
                    draw: offscreen,
                }
            }
            _ => panic!("FrameBuffer: buffer count does not match {:?} mode", mode),
        };

        Self {
            channel,
            config: DisplayConfig {
                width,
                height,
                depth,
                pitch: alloc.pitch,
            },
            mode,
            buffers,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.config.width
    }

    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.config.height
    }

    /// Bytes per pixel.
    pub fn depth(&self) -> usize {
        self.config.depth
    }

    /// Bytes per row. Nominally `width * depth`, but may be greater if the firmware elected to pad
    /// rows.
    pub fn pitch(&self) -> usize {
        self.config.pitch
    }

    /// The buffering mode this controller was initialized with.
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// The negotiated configuration.
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Start address of the buffer currently holding the draw role, the start of an array of
    /// `pitch * height` bytes.
    ///
    /// In single-buffered mode this address never changes and is on-screen at all times. In
    /// double-buffered mode it is the off-screen buffer, and moves on every
    /// [`Self::swap_buffer`].
    pub fn draw_buffer(&self) -> *mut u8 {
        self.buffers.draw as *mut u8
    }

    /// Exchange the on-screen and draw roles and bring the former draw buffer on-screen.
    ///
    /// Blocks until the firmware acknowledges the new scan-out address. In single-buffered mode
    /// there is only one buffer and this call has no effect.
    ///
    /// # Panics
    ///
    /// A channel fault while setting the visible address is fatal, consistent with
    /// [`Self::init`].
    pub fn swap_buffer(&mut self) {
        if self.mode == DisplayMode::Single {
            return;
        }

        mem::swap(&mut self.buffers.onscreen, &mut self.buffers.draw);

        if let Err(e) = self.channel.set_visible_address(self.buffers.onscreen) {
            panic!("FrameBuffer: setting visible address failed: {}", e);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use proptest::prelude::*;

    /// Rows padded the way the VideoCore pads them.
    fn padded_pitch(width: usize, depth: usize) -> usize {
        (width * depth + 31) & !31
    }

    const BUFFER_BASE: usize = 0x3C10_0000;

    #[derive(Default)]
    struct MockState {
        reject: Cell<bool>,
        negotiate_calls: Cell<usize>,
        set_visible_calls: Cell<usize>,
        visible: Cell<usize>,
        /// When set, negotiate misbehaves and returns a single buffer regardless of mode.
        short_allocation: Cell<bool>,
    }

    struct MockChannel<'a>(&'a MockState);

    impl interface::DisplayChannel for MockChannel<'_> {
        fn negotiate(
            &mut self,
            width: usize,
            height: usize,
            depth: usize,
            mode: DisplayMode,
        ) -> Result<BufferAllocation, NegotiationError> {
            self.0.negotiate_calls.set(self.0.negotiate_calls.get() + 1);

            if self.0.reject.get() {
                return Err(NegotiationError::UnsupportedConfiguration);
            }

            let pitch = padded_pitch(width, depth);
            let offscreen = match mode {
                DisplayMode::Single => None,
                DisplayMode::Double if self.0.short_allocation.get() => None,
                DisplayMode::Double => Some(BUFFER_BASE + pitch * height),
            };

            self.0.visible.set(BUFFER_BASE);

            Ok(BufferAllocation {
                visible: BUFFER_BASE,
                offscreen,
                pitch,
            })
        }

        fn set_visible_address(&mut self, addr: usize) -> Result<(), NegotiationError> {
            self.0.set_visible_calls.set(self.0.set_visible_calls.get() + 1);
            self.0.visible.set(addr);

            Ok(())
        }
    }

    #[test]
    fn geometry_is_reported_as_negotiated() {
        let state = MockState::default();
        let fb = FrameBuffer::init(MockChannel(&state), 1920, 1080, 2, DisplayMode::Single);

        assert_eq!(fb.width(), 1920);
        assert_eq!(fb.height(), 1080);
        assert_eq!(fb.depth(), 2);
        assert!(fb.pitch() >= 1920 * 2);
        assert_eq!(fb.mode(), DisplayMode::Single);
    }

    #[test]
    fn single_buffer_draw_address_never_moves() {
        let state = MockState::default();
        let mut fb = FrameBuffer::init(MockChannel(&state), 640, 480, 4, DisplayMode::Single);

        let initial = fb.draw_buffer() as usize;
        for _ in 0..3 {
            fb.swap_buffer();
            assert_eq!(fb.draw_buffer() as usize, initial);
        }

        // Swapping a single buffer must not talk to the firmware either.
        assert_eq!(state.set_visible_calls.get(), 0);
    }

    #[test]
    fn double_buffer_swap_flips_roles_as_a_unit() {
        let state = MockState::default();
        let mut fb = FrameBuffer::init(MockChannel(&state), 640, 480, 4, DisplayMode::Double);

        assert_eq!(fb.width(), 640);
        assert_eq!(fb.height(), 480);
        assert_eq!(fb.depth(), 4);
        assert!(fb.pitch() >= 2560);

        // Draw starts on the off-screen buffer.
        let p0 = fb.draw_buffer() as usize;
        assert_ne!(p0, state.visible.get());

        fb.swap_buffer();
        let p1 = fb.draw_buffer() as usize;
        assert_ne!(p0, p1);

        // The former draw buffer is now the one the firmware scans out.
        assert_eq!(state.visible.get(), p0);
        assert_eq!(state.set_visible_calls.get(), 1);

        // Swap is its own inverse when applied twice.
        fb.swap_buffer();
        assert_eq!(fb.draw_buffer() as usize, p0);
        assert_eq!(state.visible.get(), p1);
        assert_eq!(state.set_visible_calls.get(), 2);
    }

    #[test]
    #[should_panic(expected = "unsupported display configuration")]
    fn rejected_configuration_is_fatal() {
        let state = MockState::default();
        state.reject.set(true);

        let _ = FrameBuffer::init(MockChannel(&state), 640, 480, 3, DisplayMode::Single);
    }

    #[test]
    #[should_panic(expected = "buffer count does not match")]
    fn missing_second_buffer_is_fatal() {
        let state = MockState::default();
        state.short_allocation.set(true);

        let _ = FrameBuffer::init(MockChannel(&state), 640, 480, 4, DisplayMode::Double);
    }

    proptest! {
        #[test]
        fn pitch_invariant_holds_for_all_geometries(
            width in 1usize..4096,
            height in 1usize..2160,
            depth in 1usize..=4,
        ) {
            let state = MockState::default();
            let fb = FrameBuffer::init(MockChannel(&state), width, height, depth, DisplayMode::Single);

            prop_assert!(fb.pitch() >= width * depth);
            prop_assert_eq!(fb.height(), height);
        }

        #[test]
        fn draw_buffer_depends_only_on_swap_parity(swaps in 0usize..32) {
            let state = MockState::default();
            let mut fb = FrameBuffer::init(MockChannel(&state), 640, 480, 4, DisplayMode::Double);

            // One flip tells us the second address, then flip back.
            let start = fb.draw_buffer() as usize;
            fb.swap_buffer();
            let other = fb.draw_buffer() as usize;
            fb.swap_buffer();

            for _ in 0..swaps {
                fb.swap_buffer();
            }

            let expected = if swaps % 2 == 0 { start } else { other };
            prop_assert_eq!(fb.draw_buffer() as usize, expected);
        }
    }
}
