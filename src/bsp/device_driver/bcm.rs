// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2018-2023 Andre Richter <andre.o.richter@gmail.com>

//! BCM driver top level.

mod bcm2xxx_gpio_event;

pub use bcm2xxx_gpio_event::*;
