pub mod identity;
pub mod render;

pub use identity::{AuthState, IdentityProvider, ManualIdentity};
pub use render::{LogSurface, RecordingSurface, RenderSurface};
