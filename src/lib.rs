// Core modules for tiled relief-mesh splitting
pub mod boundary;
pub mod clipper;
pub mod diagnostics;
pub mod geometry;
pub mod heightmap;
pub mod pipeline;
pub mod seam;
pub mod stl;
pub mod watershed;

// Re-export commonly used types
pub use clipper::{ClipperConfig, StreamingClipper, TileId};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use geometry::{Point2D, Point3D, Triangle, Vector2D, Vector3D};
pub use heightmap::{GridMask, Heightmap, HeightmapBuilder, HeightmapConfig};
pub use pipeline::{LayoutReport, PipelineConfig, SplitReport};
pub use seam::{Axis, CutId, CutPath, Seam, SeamFinder};
pub use stl::{MeshBounds, StlReader, TileStream};

/// Main result type for the pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error kinds. Recoverable anomalies travel as diagnostics instead;
/// see the `diagnostics` module.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed mesh container: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
