//! Environment Module
//!
//! Host-environment lookups, currently the working directory that holds
//! the configuration document.

pub mod location;

pub use location::{EnvLocationResolver, LocationResolver, HOME_VARIABLE};
