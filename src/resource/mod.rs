//! Resource loading: the generic append-only manager plus the one
//! concrete resource kind the core ships (entity prototypes).

mod arena;
mod manager;
mod prototype;

pub use arena::PagedArena;
pub use manager::{ResourceHandle, ResourceKind, ResourceManager, ResourceState};
pub use prototype::{Prototype, PrototypeEntry};
