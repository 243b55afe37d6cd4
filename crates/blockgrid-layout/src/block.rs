#![forbid(unsafe_code)]

//! Block records.
//!
//! A [`Block`] is pure data: identity, type tag, grid placement, interaction
//! flags, and opaque attributes. Rendering lives behind the runtime's
//! `BlockRenderer` trait; nothing here touches a visual surface.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grid::{Footprint, GridConfig, GridPosition, GridSize};

/// Stable, unique block identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-block span limits applied by resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SizeConstraints {
    pub min_column_span: u16,
    pub min_row_span: u16,
    pub max_column_span: Option<u16>,
    pub max_row_span: Option<u16>,
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self {
            min_column_span: 1,
            min_row_span: 1,
            max_column_span: None,
            max_row_span: None,
        }
    }
}

impl SizeConstraints {
    /// Clamp a size into the constraint box and the grid's column count.
    ///
    /// The grid limit wins over `min_*` when they disagree.
    pub fn clamp(&self, size: GridSize, grid: &GridConfig) -> GridSize {
        let max_columns = self
            .max_column_span
            .unwrap_or(u16::MAX)
            .min(grid.columns.max(1));
        let max_rows = self
            .max_row_span
            .unwrap_or(u16::MAX)
            .min(grid.rows.unwrap_or(u16::MAX).max(1));
        GridSize::new(
            size.column_span
                .max(self.min_column_span.max(1))
                .min(max_columns),
            size.row_span.max(self.min_row_span.max(1)).min(max_rows),
        )
    }
}

const fn default_true() -> bool {
    true
}

/// A rectangular unit of content on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: String,
    pub grid_position: GridPosition,
    pub grid_size: GridSize,
    #[serde(default = "default_true")]
    pub movable: bool,
    #[serde(default = "default_true")]
    pub resizable: bool,
    #[serde(default)]
    pub constraints: SizeConstraints,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub attributes: Value,
}

impl Block {
    /// A movable, resizable block with no attributes.
    #[must_use]
    pub fn new(
        id: impl Into<BlockId>,
        block_type: impl Into<String>,
        grid_position: GridPosition,
        grid_size: GridSize,
    ) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            grid_position,
            grid_size,
            movable: true,
            resizable: true,
            constraints: SizeConstraints::default(),
            attributes: Value::Null,
        }
    }

    #[must_use]
    pub fn with_movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }

    #[must_use]
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    #[must_use]
    pub fn with_constraints(mut self, constraints: SizeConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Cells this block covers.
    #[inline]
    pub fn footprint(&self) -> Footprint {
        Footprint::of(self.grid_position, self.grid_size)
    }

    /// Reading-order sort key: row, then column, then id.
    pub fn reading_order_key(&self) -> (u16, u16, &BlockId) {
        (self.grid_position.row, self.grid_position.column, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serde_uses_wire_names() {
        let block = Block::new("a", "note", GridPosition::new(2, 3), GridSize::new(4, 1))
            .with_attributes(json!({ "text": "hi" }));
        let value = serde_json::to_value(&block).expect("serialize");
        assert_eq!(value["id"], "a");
        assert_eq!(value["type"], "note");
        assert_eq!(value["gridPosition"]["column"], 2);
        assert_eq!(value["gridPosition"]["zIndex"], 0);
        assert_eq!(value["gridSize"]["columnSpan"], 4);
        assert_eq!(value["attributes"]["text"], "hi");
    }

    #[test]
    fn deserialize_defaults_flags_and_accepts_width_alias() {
        let block: Block = serde_json::from_value(json!({
            "id": "b",
            "type": "chart",
            "gridPosition": { "column": 1, "row": 1 },
            "gridSize": { "width": 2, "height": 3 }
        }))
        .expect("deserialize");
        assert!(block.movable);
        assert!(block.resizable);
        assert_eq!(block.grid_size, GridSize::new(2, 3));
        assert_eq!(block.constraints, SizeConstraints::default());
        assert!(block.attributes.is_null());
    }

    #[test]
    fn constraints_clamp_to_grid_and_limits() {
        let grid = GridConfig::default();
        let constraints = SizeConstraints {
            min_column_span: 2,
            min_row_span: 1,
            max_column_span: Some(6),
            max_row_span: Some(4),
        };
        assert_eq!(
            constraints.clamp(GridSize::new(1, 9), &grid),
            GridSize::new(2, 4)
        );
        assert_eq!(
            SizeConstraints::default().clamp(GridSize::new(40, 0), &grid),
            GridSize::new(12, 1)
        );
    }

    #[test]
    fn reading_order() {
        let mut blocks = [
            Block::new("c", "x", GridPosition::new(1, 2), GridSize::default()),
            Block::new("b", "x", GridPosition::new(5, 1), GridSize::default()),
            Block::new("a", "x", GridPosition::new(2, 1), GridSize::default()),
        ];
        blocks.sort_by(|l, r| l.reading_order_key().cmp(&r.reading_order_key()));
        let ids: Vec<_> = blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
