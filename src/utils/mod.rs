// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
pub mod rng;

pub use rng::{OsRandom, RandomSource};
