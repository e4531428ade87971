// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstractions for capture devices

pub mod camera;
