//! Types shared between the bar renderer, upstream status generators and barmux.
//!
//! The wire format is the i3bar protocol: a header object, followed by an infinite
//! JSON array of status frames, with click events flowing back the other way.

pub mod click;
pub mod header;
pub mod inbound;
pub mod segment;
pub mod wrappers;

pub use click::*;
pub use header::*;
pub use inbound::*;
pub use segment::*;
pub use wrappers::*;
