#![doc = include_str!("../README.md")]

mod data;
mod error;
mod hash;
mod message;
mod peer_id;

pub use data::*;
pub use error::*;
pub use hash::*;
pub use message::*;
pub use peer_id::*;
