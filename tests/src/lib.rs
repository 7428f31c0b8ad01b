//! # Modelling Bus Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── transport_benchmarks.rs  # envelope, delta and timestamp hot paths
//! └── src/integration/
//!     ├── e2e_artefacts.rs         # state → update → considering between agents
//!     ├── e2e_observations.rs      # inline vs repository routing
//!     └── flows.rs                 # shared filesystem repository, coordination, retention
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p mb-tests
//! cargo test -p mb-tests integration::e2e_artefacts
//! cargo bench -p mb-tests
//! ```

pub mod integration;
