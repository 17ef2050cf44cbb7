//! Startup wiring for the bus-driven services.

pub mod services;
