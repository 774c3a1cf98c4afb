//! API layer for perfsimd

pub mod rest;

pub use rest::router::create_router;
