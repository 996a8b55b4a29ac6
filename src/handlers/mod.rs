//! HTTP and WS request handlers — one module per resource.

pub mod conversion;
pub mod rooms;
pub mod tournaments;
pub mod ws;
