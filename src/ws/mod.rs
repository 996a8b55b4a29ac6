//! Everything the HTTP layer needs to upgrade a request into a live Room or Tournament
//! connection — wire schema in `messages`, connection lifecycle in `hub`.

pub mod hub;
pub mod messages;

pub use hub::{run_room_connection, ConnectionClaims};
