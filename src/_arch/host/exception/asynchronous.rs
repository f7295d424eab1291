// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2020-2023 Andre Richter <andre.o.richter@gmail.com>

//! Host stand-in for architectural asynchronous exception handling.
//!
//! Compiled in place of the `aarch64` implementation when the crate is built for a hosted target,
//! which happens for the unit tests. A hosted process has no asynchronous preemption in the sense
//! of this layer, so masking state is a constant and the mask/restore pair is a no-op.
//!
//! # Orientation
//!
//! Since arch modules are imported into generic modules using the path attribute, the path of this
//! file is:
//!
//! crate::exception::asynchronous::arch_exception_async

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Returns whether IRQs are masked on the executing core.
pub fn is_local_irq_masked() -> bool {
    false
}

/// Unmask IRQs on the executing core.
///
/// # Safety
///
/// - Trivially safe on a hosted target. Kept `unsafe` for signature parity with the `aarch64`
///   implementation.
#[inline(always)]
pub unsafe fn local_irq_unmask() {}

/// Mask IRQs on the executing core.
///
/// # Safety
///
/// - Trivially safe on a hosted target. Kept `unsafe` for signature parity with the `aarch64`
///   implementation.
#[inline(always)]
pub unsafe fn local_irq_mask() {}

/// Mask IRQs on the executing core and return the previously saved interrupt mask bits.
///
/// # Safety
///
/// - Trivially safe on a hosted target. Kept `unsafe` for signature parity with the `aarch64`
///   implementation.
#[inline(always)]
pub unsafe fn local_irq_mask_save() -> u64 {
    0
}

/// Restore the interrupt mask bits using the callee's argument.
///
/// # Safety
///
/// - Trivially safe on a hosted target. Kept `unsafe` for signature parity with the `aarch64`
///   implementation.
#[inline(always)]
pub unsafe fn local_irq_restore(_saved: u64) {}
