pub mod builder;
pub mod pattern;
pub mod registry;
pub mod verbs;

pub use builder::*;
pub use pattern::*;
pub use registry::*;
pub use verbs::*;
