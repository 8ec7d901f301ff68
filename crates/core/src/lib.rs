pub mod clock;
pub mod config;
pub mod errors;
pub mod identity;
pub mod temporal;
pub mod tools;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::ApplicationError;
pub use identity::{resolve_user_context, NameSource, ResolvedIdentity, UserContext, UserProfile};
pub use temporal::TemporalContext;
pub use tools::{Tool, ToolOutput, ToolProvenance, ToolSpec};
