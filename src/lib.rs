#![doc = include_str!("../README.md")]
#![warn(rustdoc::all)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

#[macro_use]
pub mod error;

pub mod build;
pub mod clean;
pub mod command;
pub mod compdb;
pub mod config;
pub mod cycle;
pub mod depscan;
pub mod digest;
pub mod dirty;
pub mod graph;
pub mod manifest;
pub mod pal;
pub mod pool;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod toolchain;
pub mod util;

pub use build::{Build, Plan};
pub use config::BuildConfig;
pub use error::{AriaError, Result};
pub use manifest::Manifest;
pub use scheduler::ScheduleOutcome;
