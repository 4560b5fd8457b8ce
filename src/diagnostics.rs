use crate::clipper::TileId;
use crate::seam::CutId;
use serde::Serialize;

/// Recoverable anomaly kinds surfaced to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Cap reconstruction could not close a segment loop for a cut
    OpenLoop,
    /// Seam search found no finite-cost cell in the last row; mid-line used
    EmptySeamFallback,
    /// Input triangle had zero area and was skipped
    DroppedDegenerate,
    /// Input record carried non-finite coordinates and was skipped
    MalformedRecord,
}

/// One structured diagnostic record
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub cut: Option<CutId>,
    pub tile: Option<TileId>,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            cut: None,
            tile: None,
            detail: detail.into(),
        }
    }

    pub fn for_cut(kind: DiagnosticKind, cut: CutId, detail: impl Into<String>) -> Self {
        Self {
            kind,
            cut: Some(cut),
            tile: None,
            detail: detail.into(),
        }
    }
}

/// Collecting sink for diagnostics. Every record is logged once on arrival
/// and kept for the caller's report.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Diagnostic) {
        log::warn!(
            "{:?} (cut={:?}, tile={:?}): {}",
            record.kind,
            record.cut,
            record.tile,
            record.detail
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Diagnostic> {
        self.records
    }
}
