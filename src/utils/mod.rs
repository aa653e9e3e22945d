pub mod angle;
pub mod reference;

pub use angle::normalize_degrees;
pub use reference::generate_reference;
