//! Judges for spatial-relationship evaluation.
//!
//! A judge turns a generated image into structured observations, here the
//! labeled [`BoundingBox`]es of the objects it contains.

mod bbox;
pub mod detr;

pub use bbox::{BoundingBox, CartesianCoordinate2D};
pub use detr::{DetrSpatialRelationshipJudge, JudgeConfig};
