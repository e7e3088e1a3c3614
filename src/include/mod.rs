//! Include expansion for SDUI templates
//!
//! Expansion pipeline for a single directive:
//! 1. Directive parsing (path, patches, state selection)
//! 2. Sandboxed path resolution
//! 3. Load, then recursive resolution of nested includes
//! 4. Patches, then state selection and flattening

pub mod directive;
pub mod resolver;
pub mod sandbox;
pub mod state;

pub use directive::{Directive, IncludeForm, IncludeKind, IncludeSpec};
pub use resolver::{missing_component, IncludeResolver, ResolutionContext};
pub use sandbox::PathSandbox;
pub use state::{flatten, select_state, Flattened, StateSelection};
