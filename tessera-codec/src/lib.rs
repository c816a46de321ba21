/// Shared re-export of minicbor across all Tessera crates
pub use minicbor;

/// Round-trip friendly common helper structs
pub mod utils;
