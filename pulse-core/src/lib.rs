pub mod coach;
pub mod config;
pub mod exercise;
pub mod geometry;
pub mod logging;
pub mod runtime;
pub mod session;

#[cfg(feature = "uniffi")]
uniffi::setup_scaffolding!();
#[cfg(feature = "uniffi")]
pub mod uniffi_interface;
