#![forbid(unsafe_code)]

//! Board documents: the import/export boundary.
//!
//! A document is `{ "blocks": [...], "grid": {...}, "version": 1 }` with
//! camelCase keys. Export is a deep snapshot; import replaces the block set
//! and grid wholesale after [`BoardDocument::check`] accepts it.

use std::fmt;

use blockgrid_layout::{
    Block, BlockId, GridConfig, GridConfigError, GridCoordinateSystem, SpatialIndex,
};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Document format version written by export.
pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDocument {
    pub blocks: Vec<Block>,
    pub grid: GridConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl BoardDocument {
    #[must_use]
    pub fn new(blocks: Vec<Block>, grid: GridConfig) -> Self {
        Self {
            blocks,
            grid,
            version: Some(DOCUMENT_VERSION),
        }
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(DocumentError::Json)
    }

    pub fn from_json(s: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(s).map_err(DocumentError::Json)
    }

    /// Structural checks run before import.
    ///
    /// Rejects newer format versions, invalid grids, duplicate ids,
    /// out-of-bounds blocks, and (unless `allow_overlap`) overlapping blocks.
    pub fn check(&self, allow_overlap: bool) -> Result<(), DocumentError> {
        if let Some(version) = self.version {
            if version > DOCUMENT_VERSION {
                return Err(DocumentError::UnsupportedVersion(version));
            }
        }
        self.grid.validate().map_err(DocumentError::InvalidGrid)?;

        let coords = GridCoordinateSystem::new(self.grid);
        let mut seen: FxHashSet<&BlockId> = FxHashSet::default();
        let mut index = SpatialIndex::new();
        for block in &self.blocks {
            if !seen.insert(&block.id) {
                return Err(DocumentError::DuplicateId(block.id.clone()));
            }
            if !coords.is_valid_position(block.grid_position, block.grid_size) {
                return Err(DocumentError::OutOfBounds(block.id.clone()));
            }
            if !allow_overlap {
                let hits = index.find_potential_collisions(block.grid_position, block.grid_size);
                if let Some(other) = hits.into_iter().next() {
                    return Err(DocumentError::Overlap {
                        first: other,
                        second: block.id.clone(),
                    });
                }
            }
            index.add_block(&block.id, block.grid_position, block.grid_size);
        }
        Ok(())
    }
}

/// Import/export failures.
#[derive(Debug)]
pub enum DocumentError {
    Json(serde_json::Error),
    InvalidGrid(GridConfigError),
    DuplicateId(BlockId),
    OutOfBounds(BlockId),
    Overlap { first: BlockId, second: BlockId },
    UnsupportedVersion(u32),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "JSON error: {e}"),
            Self::InvalidGrid(e) => write!(f, "invalid grid: {e}"),
            Self::DuplicateId(id) => write!(f, "duplicate block id '{id}'"),
            Self::OutOfBounds(id) => write!(f, "block '{id}' lies outside the grid"),
            Self::Overlap { first, second } => {
                write!(f, "blocks '{first}' and '{second}' overlap")
            }
            Self::UnsupportedVersion(v) => {
                write!(f, "document version {v} is newer than {DOCUMENT_VERSION}")
            }
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::InvalidGrid(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockgrid_layout::{GridPosition, GridSize};

    fn block(id: &str, column: u16, row: u16, w: u16, h: u16) -> Block {
        Block::new(id, "box", GridPosition::new(column, row), GridSize::new(w, h))
    }

    #[test]
    fn parses_camel_case_document() {
        let doc = BoardDocument::from_json(
            r#"{
                "blocks": [{
                    "id": "a",
                    "type": "note",
                    "gridPosition": { "column": 2, "row": 1 },
                    "gridSize": { "columnSpan": 3, "rowSpan": 2 },
                    "attributes": { "text": "hi" }
                }],
                "grid": { "columns": 12, "rowHeight": 60, "gap": 8 }
            }"#,
        )
        .expect("parse");
        assert_eq!(doc.version, None);
        assert_eq!(doc.blocks[0].block_type, "note");
        assert_eq!(doc.blocks[0].grid_size, GridSize::new(3, 2));
        assert!(doc.blocks[0].movable);
        assert!(doc.check(false).is_ok());
    }

    #[test]
    fn export_writes_version() {
        let doc = BoardDocument::new(vec![block("a", 1, 1, 1, 1)], GridConfig::default());
        let json = doc.to_json().expect("serialize");
        assert!(json.contains("\"version\": 1"));
        assert!(json.contains("\"gridPosition\""));
    }

    #[test]
    fn check_rejects_bad_documents() {
        let grid = GridConfig::default();
        let dup = BoardDocument::new(vec![block("a", 1, 1, 1, 1), block("a", 5, 1, 1, 1)], grid);
        assert!(matches!(dup.check(false), Err(DocumentError::DuplicateId(_))));

        let oob = BoardDocument::new(vec![block("a", 11, 1, 3, 1)], grid);
        assert!(matches!(oob.check(false), Err(DocumentError::OutOfBounds(_))));

        let overlap = BoardDocument::new(vec![block("a", 1, 1, 2, 2), block("b", 2, 2, 1, 1)], grid);
        assert!(matches!(
            overlap.check(false),
            Err(DocumentError::Overlap { .. })
        ));
        assert!(overlap.check(true).is_ok());

        let mut future = BoardDocument::new(Vec::new(), grid);
        future.version = Some(DOCUMENT_VERSION + 1);
        assert!(matches!(
            future.check(false),
            Err(DocumentError::UnsupportedVersion(_))
        ));
    }
}
