// SPDX-License-Identifier: GPL-3.0-only

//! Media encoding: codec identities and encoder sinks

pub mod codec;
pub mod encoders;
