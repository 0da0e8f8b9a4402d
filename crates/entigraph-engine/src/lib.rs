pub mod events;
pub mod memory;
pub mod pipeline;
pub mod resolver;

pub use events::*;
pub use memory::*;
pub use pipeline::*;
pub use resolver::*;
