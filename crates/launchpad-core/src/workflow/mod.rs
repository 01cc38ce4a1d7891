//! # Workflow Module
//!
//! The site deployment lifecycle: stage enumeration, display metadata and
//! the rules for moving between stages.

mod stage;
mod transition;

pub use stage::*;
pub use transition::*;
