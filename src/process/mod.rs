//! Process registry & dispatcher (spec §4.5).

mod descriptor;
mod dispatch;
mod registry;

pub use descriptor::{FutureArity, OverloadDescriptor, Process};
pub use dispatch::{Context, DispatchFn, FutureSlot};
pub use registry::{ProcessHandle, ProcessRegistry};
