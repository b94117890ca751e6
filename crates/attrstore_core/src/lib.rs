pub mod api;
pub mod codec;
pub mod error;
pub mod escape;
pub mod key;

pub use api::*;
pub use error::{AttrError, AttrResult};
pub use key::*;
