//! Procedural aurora background and a one-time Nordic forest intro.
//!
//! The library renders into plain RGBA8 buffers ([`visual::RenderSurface`]);
//! the terminal host in [`app`] downsamples them into half-block cells.

pub mod app;
pub mod audio;
pub mod color;
pub mod config;
pub mod contact;
pub mod driver;
pub mod error;
pub mod intro;
pub mod noise;
pub mod render;
pub mod sound;
pub mod storage;
pub mod terminal;
pub mod visual;
