//! Floor-plan dataset corpora
//!
//! Two cached artifacts: the SVG corpus (raw plans keyed by ID) and the
//! geometry corpus derived from it, plus deterministic sampling over the
//! latter.

pub mod error;
pub mod schema;
pub mod raw;
pub mod svg;
pub mod geometry;
pub mod sampler;

pub use error::*;
pub use schema::*;
pub use raw::*;
pub use svg::*;
pub use geometry::*;
pub use sampler::*;
