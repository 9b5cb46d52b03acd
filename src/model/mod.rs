//! Learned mailbox models
//!
//! ## Module Structure
//!
//! - `adjacency_table`: character transition counts and their confidence
//! - `arrivals`: arrival order of a model's samples, with restorable removals
//! - `diff_and_atables`: one template plus a transition table per gap
//! - `thresholded`: buckets of clustered templates, one bucket per minimum
//!   segment length

pub mod adjacency_table;
pub mod arrivals;
pub mod diff_and_atables;
pub mod thresholded;

pub use adjacency_table::{AdjacencyTable, AdjacencyTableSnapshot, Token};
pub use arrivals::Arrivals;
pub use diff_and_atables::{Assessment, DiffAndAtables, Freshness};
pub use thresholded::{ClusterBucket, ThresholdedDiffAndAtables};
