#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
mod core;
pub mod engine;
mod error;
mod io;
pub mod map;
pub mod tasks;
mod utils;

pub use crate::config::{
    AssetOptions, CdnOptions, FingerprintOptions, Locals, OutputStyle, Paths, Profile,
    ProfileName, ServerOptions, StyleOptions, TemplateOptions, VendorOptions,
};
pub use crate::core::{Environment, Mode, TaskContext};
pub use crate::engine::{Blueprint, Diagnostics, TaskExecution, Website};
pub use crate::error::*;
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
