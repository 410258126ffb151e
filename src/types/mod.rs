//! Core types for the scenario kernel.

pub mod edit;
pub mod segment;

pub use edit::{EditBatch, EditOperation, EditWarning, EditWarningKind, EditsNotAList};
pub use segment::{planar_length, FunctionalClass, Segment, SegmentId};
