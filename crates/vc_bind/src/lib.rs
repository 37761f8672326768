#![doc = include_str!("../README.md")]

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

mod cache;
mod config;
mod mapper;

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod info;
pub mod introspect;
pub mod poly;
pub mod registry;
pub mod token;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use config::MapperConfig;
pub use error::BindError;
pub use mapper::{Mapper, MapperBuilder, MapperStats};
