//! Responsive layout state derived from the container size.

pub mod breakpoint;

pub use breakpoint::{Breakpoint, BreakpointResolver, BreakpointTable};
