//! Domain layer: artefact state machine and deltas, no I/O.

pub mod delta;
pub mod state;

pub use delta::Delta;
pub use state::ArtefactState;
