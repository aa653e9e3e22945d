pub mod account;
pub mod common;
pub mod request;
pub mod wheel;

pub use account::*;
pub use common::*;
pub use request::*;
pub use wheel::*;
