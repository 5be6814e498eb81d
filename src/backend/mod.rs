//! Backend command client: process spawning, one-shot queries and
//! streaming operations.

mod client;
mod error;
mod events;
mod invoker;
mod models;
mod ops;
mod process;
mod stream;

pub use client::*;
pub use error::*;
pub use events::*;
pub use invoker::*;
pub use models::*;
pub use ops::*;
pub use process::*;
pub use stream::*;
