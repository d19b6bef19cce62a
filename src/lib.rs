//! `ledsync` keeps a smart light in sync with the dominant color of a screen.
//!
//! # Structure
//!
//! A [sync::Supervisor] owns the sampling loop. Every cycle captures a frame through a
//! [capture::FrameSource], downscales it, finds its most frequent quantized color and sends it
//! to a [controller::LightController] if it moved far enough from the last color sent.
//! Per-cycle statistics can be appended to a JSON log by the [stats] module.
//!
//! The loop is started and stopped through a [sync::SyncHandle], usually driven by
//! [control::drive] from standard input.
//!
//! # License
//!
//! This source code is released under the [MIT-License](https://opensource.org/licenses/MIT)

#[macro_use]
extern crate tracing;

pub mod analysis;
pub mod capture;
pub mod color;
pub mod control;
pub mod controller;
pub mod detector;
pub mod image;
pub mod models;
pub mod stats;
pub mod sync;
