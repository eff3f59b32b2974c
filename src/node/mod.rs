// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
pub mod session;
pub mod transport;

pub use session::{NodeSession, Observer, SessionState};
pub use transport::{LightTransport, LoopbackTransport};
