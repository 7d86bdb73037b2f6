/*!
Harmonization of polling-station vote tallies into canonical vote matrices, and their
structural analysis: principal components, Ward clustering, displacements between two
elections and canonical correlations.

See the [manual] for the input conventions and the artifacts produced.
*/
mod config;

pub mod artifacts;
pub mod batch;
pub mod builder;
pub mod cca;
pub mod clustering;
pub mod geography;
pub mod identifiers;
pub mod manual;
pub mod matrix;
pub mod normalize;
pub mod pca;
pub mod shift;

pub use crate::config::*;

pub use crate::artifacts::{Artifact, ArtifactKey, ArtifactTable, ArtifactWriter, MemoryWriter};
pub use crate::batch::{run_batch, write_report, BatchPlan, BatchReport, PairRequest, RawInput};
pub use crate::geography::RegionGroup;
pub use crate::matrix::VoteMatrix;
pub use crate::normalize::{Cell, RawTable};
