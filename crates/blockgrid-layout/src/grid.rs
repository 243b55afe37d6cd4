#![forbid(unsafe_code)]

//! Grid configuration and the pixel↔cell coordinate system.
//!
//! Cells are 1-based: column `1` is the leftmost column, row `1` the top row.
//! A footprint is the inclusive cell range a position+size covers.
//!
//! # Pixel layout
//!
//! ```text
//! |pad| col 1 |gap| col 2 |gap| ... |gap| col N |pad|
//!      <-cw->       <-cw->               <-cw->
//! cw = (inner_width - gap * (N - 1)) / N
//! ```
//!
//! Rows have a fixed `row_height` separated by the same `gap`.
//!
//! # Failure Modes
//!
//! Queries never fail: pixel lookups clamp into the grid and first-fit search
//! falls back to `(1, 1)` when nothing fits inside the scan window.

use std::fmt;

use blockgrid_core::geometry::{ContainerBox, PixelRect, Point};
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};

/// Rows scanned by first-fit search when the grid has no row limit.
pub const DEFAULT_SCAN_ROWS: u16 = 100;

/// Board grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridConfig {
    /// Number of columns (> 0).
    pub columns: u16,
    /// Row limit, or `None` for an unbounded grid.
    pub rows: Option<u16>,
    /// Height of one row in pixels (> 0).
    pub row_height: f64,
    /// Gap between adjacent cells in pixels (>= 0).
    pub gap: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 12,
            rows: None,
            row_height: 60.0,
            gap: 8.0,
        }
    }
}

impl GridConfig {
    /// Create a configuration with unbounded rows.
    #[must_use]
    pub const fn new(columns: u16, row_height: f64, gap: f64) -> Self {
        Self {
            columns,
            rows: None,
            row_height,
            gap,
        }
    }

    /// Set a row limit.
    #[must_use]
    pub const fn with_rows(mut self, rows: u16) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), GridConfigError> {
        if self.columns == 0 {
            return Err(GridConfigError::ZeroColumns);
        }
        if self.rows == Some(0) {
            return Err(GridConfigError::ZeroRows);
        }
        if !(self.row_height.is_finite() && self.row_height > 0.0) {
            return Err(GridConfigError::InvalidRowHeight {
                row_height: self.row_height,
            });
        }
        if !(self.gap.is_finite() && self.gap >= 0.0) {
            return Err(GridConfigError::InvalidGap { gap: self.gap });
        }
        Ok(())
    }
}

/// Grid configuration validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GridConfigError {
    ZeroColumns,
    ZeroRows,
    InvalidRowHeight { row_height: f64 },
    InvalidGap { gap: f64 },
}

impl fmt::Display for GridConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroColumns => write!(f, "grid must have at least one column"),
            Self::ZeroRows => write!(f, "bounded grid must have at least one row"),
            Self::InvalidRowHeight { row_height } => {
                write!(f, "row height must be > 0 (got {row_height})")
            }
            Self::InvalidGap { gap } => write!(f, "gap must be >= 0 (got {gap})"),
        }
    }
}

impl std::error::Error for GridConfigError {}

/// One grid cell (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub column: u16,
    pub row: u16,
}

impl GridCell {
    #[inline]
    pub const fn new(column: u16, row: u16) -> Self {
        Self { column, row }
    }
}

/// Top-left anchor of a block plus its stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPosition {
    pub column: u16,
    pub row: u16,
    #[serde(default)]
    pub z_index: i32,
}

impl GridPosition {
    /// The top-left cell, used as the never-fail placement fallback.
    pub const ORIGIN: Self = Self::new(1, 1);

    #[inline]
    pub const fn new(column: u16, row: u16) -> Self {
        Self {
            column,
            row,
            z_index: 0,
        }
    }

    #[must_use]
    pub const fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// The anchor cell.
    #[inline]
    pub const fn cell(self) -> GridCell {
        GridCell::new(self.column, self.row)
    }

    /// Same cell, ignoring stacking order.
    #[inline]
    pub const fn same_cell(self, other: GridPosition) -> bool {
        self.column == other.column && self.row == other.row
    }

    /// Shift by a cell delta, saturating at column/row 1.
    #[must_use]
    pub fn shifted(self, columns: i32, rows: i32) -> Self {
        Self {
            column: shift_axis(self.column, columns),
            row: shift_axis(self.row, rows),
            z_index: self.z_index,
        }
    }

    /// Signed cell delta `self - origin`.
    #[inline]
    pub fn delta_from(self, origin: GridPosition) -> (i32, i32) {
        (
            i32::from(self.column) - i32::from(origin.column),
            i32::from(self.row) - i32::from(origin.row),
        )
    }
}

fn shift_axis(value: u16, delta: i32) -> u16 {
    let shifted = i32::from(value).saturating_add(delta);
    shifted.clamp(1, i32::from(u16::MAX)) as u16
}

/// Block extent in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSize {
    #[serde(alias = "width")]
    pub column_span: u16,
    #[serde(alias = "height")]
    pub row_span: u16,
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl GridSize {
    #[inline]
    pub const fn new(column_span: u16, row_span: u16) -> Self {
        Self {
            column_span,
            row_span,
        }
    }
}

/// Inclusive cell range covered by a position+size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Footprint {
    pub column_start: u16,
    pub column_end: u16,
    pub row_start: u16,
    pub row_end: u16,
}

impl Footprint {
    /// Footprint of a block anchored at `position` with `size`.
    ///
    /// Zero spans are treated as one cell so every footprint is non-empty.
    pub fn of(position: GridPosition, size: GridSize) -> Self {
        Self {
            column_start: position.column,
            column_end: position
                .column
                .saturating_add(size.column_span.max(1) - 1),
            row_start: position.row,
            row_end: position.row.saturating_add(size.row_span.max(1) - 1),
        }
    }

    /// Inclusive interval test on both axes.
    #[inline]
    pub const fn overlaps(&self, other: &Footprint) -> bool {
        self.columns_overlap(other) && self.rows_overlap(other)
    }

    #[inline]
    pub const fn columns_overlap(&self, other: &Footprint) -> bool {
        self.column_start <= other.column_end && other.column_start <= self.column_end
    }

    #[inline]
    pub const fn rows_overlap(&self, other: &Footprint) -> bool {
        self.row_start <= other.row_end && other.row_start <= self.row_end
    }

    /// Number of cells covered.
    #[inline]
    pub fn cell_count(&self) -> usize {
        usize::from(self.column_end - self.column_start + 1)
            * usize::from(self.row_end - self.row_start + 1)
    }

    /// Covered cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (self.row_start..=self.row_end).flat_map(move |row| {
            (self.column_start..=self.column_end).map(move |column| GridCell::new(column, row))
        })
    }
}

/// First-fit scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// Left-to-right, then top-to-bottom.
    #[default]
    RowMajor,
    /// Top-to-bottom, then left-to-right.
    ColumnMajor,
}

/// Pure grid geometry for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GridCoordinateSystem {
    config: GridConfig,
}

impl GridCoordinateSystem {
    #[must_use]
    pub const fn new(config: GridConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Width of one column in pixels for a container.
    pub fn cell_width(&self, container: &ContainerBox) -> f64 {
        let columns = f64::from(self.config.columns.max(1));
        let gaps = self.config.gap * (columns - 1.0);
        ((container.inner_width() - gaps) / columns).max(0.0)
    }

    /// Horizontal distance between the left edges of adjacent columns.
    #[inline]
    pub fn column_pitch(&self, container: &ContainerBox) -> f64 {
        self.cell_width(container) + self.config.gap
    }

    /// Vertical distance between the top edges of adjacent rows.
    #[inline]
    pub fn row_pitch(&self) -> f64 {
        self.config.row_height + self.config.gap
    }

    /// Cell under a viewport point, clamped into the grid.
    pub fn pixel_to_grid(&self, point: Point, container: &ContainerBox) -> GridCell {
        let content = container.content();
        let column_pitch = self.column_pitch(container);
        let row_pitch = self.row_pitch();

        let column = if column_pitch > 0.0 {
            ((point.x - content.x) / column_pitch).floor() + 1.0
        } else {
            1.0
        };
        let row = if row_pitch > 0.0 {
            ((point.y - content.y) / row_pitch).floor() + 1.0
        } else {
            1.0
        };

        let max_row = self.config.rows.map_or(f64::from(u16::MAX), f64::from);
        GridCell::new(
            column.clamp(1.0, f64::from(self.config.columns.max(1))) as u16,
            row.clamp(1.0, max_row) as u16,
        )
    }

    /// Viewport position of a cell's top-left corner.
    pub fn grid_to_pixel(&self, cell: GridCell, container: &ContainerBox) -> Point {
        let content = container.content();
        Point::new(
            content.x + f64::from(cell.column.saturating_sub(1)) * self.column_pitch(container),
            content.y + f64::from(cell.row.saturating_sub(1)) * self.row_pitch(),
        )
    }

    /// Viewport box of a footprint.
    pub fn block_rect(
        &self,
        position: GridPosition,
        size: GridSize,
        container: &ContainerBox,
    ) -> PixelRect {
        let origin = self.grid_to_pixel(position.cell(), container);
        let cell_width = self.cell_width(container);
        let columns = f64::from(size.column_span.max(1));
        let rows = f64::from(size.row_span.max(1));
        PixelRect::new(
            origin.x,
            origin.y,
            columns * cell_width + (columns - 1.0) * self.config.gap,
            rows * self.config.row_height + (rows - 1.0) * self.config.gap,
        )
    }

    /// Convert a pixel delta into whole-cell deltas (nearest cell).
    pub fn grid_delta(&self, dx: f64, dy: f64, container: &ContainerBox) -> (i32, i32) {
        let column_pitch = self.column_pitch(container);
        let row_pitch = self.row_pitch();
        let columns = if column_pitch > 0.0 {
            (dx / column_pitch).round() as i32
        } else {
            0
        };
        let rows = if row_pitch > 0.0 {
            (dy / row_pitch).round() as i32
        } else {
            0
        };
        (columns, rows)
    }

    /// Bounds check only.
    pub fn is_valid_position(&self, position: GridPosition, size: GridSize) -> bool {
        if position.column < 1 || position.row < 1 {
            return false;
        }
        if size.column_span < 1 || size.row_span < 1 {
            return false;
        }
        let last_column = u32::from(position.column) + u32::from(size.column_span) - 1;
        if last_column > u32::from(self.config.columns) {
            return false;
        }
        match self.config.rows {
            Some(rows) => u32::from(position.row) + u32::from(size.row_span) - 1 <= u32::from(rows),
            None => true,
        }
    }

    /// Nearest in-bounds anchor for a footprint.
    ///
    /// Oversized spans pin to column/row 1.
    pub fn clamp_position(&self, position: GridPosition, size: GridSize) -> GridPosition {
        let max_column = self
            .config
            .columns
            .saturating_sub(size.column_span.max(1))
            .saturating_add(1)
            .max(1);
        let max_row = self.config.rows.map_or(u16::MAX, |rows| {
            rows.saturating_sub(size.row_span.max(1))
                .saturating_add(1)
                .max(1)
        });
        GridPosition {
            column: position.column.clamp(1, max_column),
            row: position.row.clamp(1, max_row),
            z_index: position.z_index,
        }
    }

    /// Brute-force overlap test against every block except `exclude`.
    pub fn collides<'a>(
        &self,
        position: GridPosition,
        size: GridSize,
        exclude: Option<&BlockId>,
        blocks: impl IntoIterator<Item = &'a Block>,
    ) -> bool {
        let footprint = Footprint::of(position, size);
        blocks
            .into_iter()
            .filter(|block| exclude != Some(&block.id))
            .any(|block| block.footprint().overlaps(&footprint))
    }

    /// Last anchor row the first-fit scan visits for a footprint height.
    fn scan_last_row(&self, row_span: u16) -> u16 {
        match self.config.rows {
            Some(rows) => rows.saturating_sub(row_span.max(1)).saturating_add(1),
            None => DEFAULT_SCAN_ROWS,
        }
    }

    /// Generic first-fit scan starting at `start_row`.
    ///
    /// Returns `None` when no anchor inside the scan window satisfies
    /// `is_free`.
    pub fn first_fit(
        &self,
        size: GridSize,
        order: ScanOrder,
        start_row: u16,
        mut is_free: impl FnMut(GridPosition) -> bool,
    ) -> Option<GridPosition> {
        if size.column_span > self.config.columns {
            return None;
        }
        let last_column = self.config.columns - size.column_span.max(1) + 1;
        let last_row = self.scan_last_row(size.row_span);
        let first_row = start_row.max(1);
        if first_row > last_row {
            return None;
        }
        match order {
            ScanOrder::RowMajor => {
                for row in first_row..=last_row {
                    for column in 1..=last_column {
                        let candidate = GridPosition::new(column, row);
                        if is_free(candidate) {
                            return Some(candidate);
                        }
                    }
                }
            }
            ScanOrder::ColumnMajor => {
                for column in 1..=last_column {
                    for row in first_row..=last_row {
                        let candidate = GridPosition::new(column, row);
                        if is_free(candidate) {
                            return Some(candidate);
                        }
                    }
                }
            }
        }
        None
    }

    /// First non-colliding anchor in reading order, or `(1, 1)`.
    pub fn find_available_position<'a>(
        &self,
        size: GridSize,
        blocks: impl IntoIterator<Item = &'a Block> + Clone,
    ) -> GridPosition {
        self.first_fit(size, ScanOrder::RowMajor, 1, |candidate| {
            !self.collides(candidate, size, None, blocks.clone())
        })
        .unwrap_or(GridPosition::ORIGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockgrid_core::geometry::Sides;

    fn coords() -> GridCoordinateSystem {
        GridCoordinateSystem::new(GridConfig::new(12, 60.0, 8.0))
    }

    // 12 columns of 60px with 8px gaps: 12 * 60 + 11 * 8 = 808px.
    fn container() -> ContainerBox {
        ContainerBox::new(PixelRect::new(100.0, 50.0, 828.0, 600.0), Sides::all(10.0))
    }

    fn block(id: &str, column: u16, row: u16, w: u16, h: u16) -> Block {
        Block::new(id, "box", GridPosition::new(column, row), GridSize::new(w, h))
    }

    #[test]
    fn cell_width_inverts_gap_layout() {
        assert_eq!(coords().cell_width(&container()), 60.0);
        assert_eq!(coords().column_pitch(&container()), 68.0);
        assert_eq!(coords().row_pitch(), 68.0);
    }

    #[test]
    fn pixel_to_grid_round_trips_cell_origins() {
        let coords = coords();
        let container = container();
        for cell in [
            GridCell::new(1, 1),
            GridCell::new(5, 3),
            GridCell::new(12, 9),
        ] {
            let point = coords.grid_to_pixel(cell, &container);
            assert_eq!(coords.pixel_to_grid(point.offset(1.0, 1.0), &container), cell);
        }
    }

    #[test]
    fn pixel_to_grid_clamps() {
        let coords = coords();
        let container = container();
        assert_eq!(
            coords.pixel_to_grid(Point::new(-500.0, -500.0), &container),
            GridCell::new(1, 1)
        );
        assert_eq!(
            coords.pixel_to_grid(Point::new(5_000.0, 200.0), &container).column,
            12
        );
    }

    #[test]
    fn pixel_to_grid_respects_row_limit() {
        let coords = GridCoordinateSystem::new(GridConfig::new(12, 60.0, 8.0).with_rows(4));
        assert_eq!(
            coords
                .pixel_to_grid(Point::new(120.0, 10_000.0), &container())
                .row,
            4
        );
    }

    #[test]
    fn block_rect_spans_gaps() {
        let rect = coords().block_rect(GridPosition::new(2, 1), GridSize::new(3, 2), &container());
        assert_eq!(rect, PixelRect::new(178.0, 60.0, 196.0, 128.0));
    }

    #[test]
    fn grid_delta_rounds_to_nearest_cell() {
        let coords = coords();
        let container = container();
        assert_eq!(coords.grid_delta(33.0, -35.0, &container), (0, -1));
        assert_eq!(coords.grid_delta(140.0, 0.0, &container), (2, 0));
    }

    #[test]
    fn valid_position_checks_bounds() {
        let coords = coords();
        assert!(coords.is_valid_position(GridPosition::new(10, 1), GridSize::new(3, 1)));
        assert!(!coords.is_valid_position(GridPosition::new(11, 1), GridSize::new(3, 1)));
        assert!(!coords.is_valid_position(GridPosition::new(0, 1), GridSize::new(1, 1)));
        assert!(coords.is_valid_position(GridPosition::new(1, 500), GridSize::new(1, 1)));

        let bounded = GridCoordinateSystem::new(GridConfig::default().with_rows(4));
        assert!(bounded.is_valid_position(GridPosition::new(1, 3), GridSize::new(1, 2)));
        assert!(!bounded.is_valid_position(GridPosition::new(1, 4), GridSize::new(1, 2)));
    }

    #[test]
    fn clamp_position_keeps_span_inside() {
        let coords = coords();
        assert_eq!(
            coords.clamp_position(GridPosition::new(12, 0), GridSize::new(3, 1)),
            GridPosition::new(10, 1)
        );
    }

    #[test]
    fn collides_uses_inclusive_intervals() {
        let coords = coords();
        let blocks = [block("a", 1, 1, 3, 2)];
        assert!(coords.collides(GridPosition::new(3, 2), GridSize::new(1, 1), None, &blocks));
        assert!(!coords.collides(GridPosition::new(4, 1), GridSize::new(1, 1), None, &blocks));
        assert!(!coords.collides(GridPosition::new(1, 3), GridSize::new(1, 1), None, &blocks));
        assert!(!coords.collides(
            GridPosition::new(1, 1),
            GridSize::new(1, 1),
            Some(&BlockId::from("a")),
            &blocks
        ));
    }

    #[test]
    fn find_available_position_skips_occupied_columns() {
        let blocks = [block("a", 1, 1, 3, 2)];
        assert_eq!(
            coords().find_available_position(GridSize::new(3, 2), &blocks),
            GridPosition::new(4, 1)
        );
    }

    #[test]
    fn full_first_row_moves_to_second() {
        let blocks: Vec<Block> = (1..=12)
            .map(|column| block(&format!("b{column}"), column, 1, 1, 1))
            .collect();
        for size in [GridSize::new(1, 1), GridSize::new(4, 3), GridSize::new(12, 1)] {
            assert_eq!(
                coords().find_available_position(size, &blocks),
                GridPosition::new(1, 2)
            );
        }
    }

    #[test]
    fn find_available_position_falls_back_to_origin() {
        let bounded = GridCoordinateSystem::new(GridConfig::default().with_rows(1));
        let blocks = [block("wide", 1, 1, 12, 1)];
        assert_eq!(
            bounded.find_available_position(GridSize::new(1, 1), &blocks),
            GridPosition::ORIGIN
        );
        assert_eq!(
            coords().find_available_position(GridSize::new(13, 1), &blocks),
            GridPosition::ORIGIN
        );
    }

    #[test]
    fn column_major_scan_fills_down_first() {
        let blocks = [block("a", 1, 1, 1, 1)];
        let found = coords().first_fit(GridSize::new(1, 1), ScanOrder::ColumnMajor, 1, |p| {
            !coords().collides(p, GridSize::new(1, 1), None, &blocks)
        });
        assert_eq!(found, Some(GridPosition::new(1, 2)));
    }

    #[test]
    fn footprint_cells_are_row_major() {
        let footprint = Footprint::of(GridPosition::new(2, 3), GridSize::new(2, 2));
        let cells: Vec<_> = footprint.cells().collect();
        assert_eq!(
            cells,
            vec![
                GridCell::new(2, 3),
                GridCell::new(3, 3),
                GridCell::new(2, 4),
                GridCell::new(3, 4)
            ]
        );
        assert_eq!(footprint.cell_count(), 4);
    }

    #[test]
    fn shifted_saturates_at_one() {
        assert_eq!(
            GridPosition::new(2, 2).shifted(-5, 3),
            GridPosition::new(1, 5)
        );
    }

    #[test]
    fn config_validation() {
        assert!(GridConfig::default().validate().is_ok());
        assert_eq!(
            GridConfig::new(0, 60.0, 8.0).validate(),
            Err(GridConfigError::ZeroColumns)
        );
        assert!(matches!(
            GridConfig::new(12, 0.0, 8.0).validate(),
            Err(GridConfigError::InvalidRowHeight { .. })
        ));
        assert!(matches!(
            GridConfig::new(12, 60.0, -1.0).validate(),
            Err(GridConfigError::InvalidGap { .. })
        ));
    }
}
