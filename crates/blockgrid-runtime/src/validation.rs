#![forbid(unsafe_code)]

//! Placement validation.
//!
//! Validation never fails with `Err`: every check contributes to a
//! [`ValidationReport`]. Bounds and collisions are built in; hosts add
//! business rules by registering [`PlacementRule`] objects.
//!
//! A group of placements is validated as a unit: members never collide with
//! each other's *old* footprints (they move together) but must not overlap
//! each other's *new* footprints.
//!
//! # Failure Modes
//!
//! A rule that panics is reported as a failed rule; the panic never escapes
//! validation.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use blockgrid_layout::{
    Block, BlockId, Footprint, GridConfig, GridCoordinateSystem, GridPosition, GridSize,
    ScanOrder, SpatialIndex,
};
use tracing::warn;

use crate::error::panic_message;

/// One proposed footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement<'a> {
    /// `None` for a block that does not exist yet.
    pub block_id: Option<&'a BlockId>,
    pub block_type: &'a str,
    pub position: GridPosition,
    pub size: GridSize,
}

/// Read-only view handed to [`PlacementRule::check`].
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext<'a> {
    pub placement: Placement<'a>,
    pub blocks: &'a [Block],
    pub grid: &'a GridConfig,
}

/// A rule's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleVerdict {
    Pass,
    Warn(String),
    Fail(String),
}

/// Host-supplied business rule.
pub trait PlacementRule {
    /// Stable name used in reports and logs.
    fn name(&self) -> &str;

    fn check(&self, context: &PlacementContext<'_>) -> RuleVerdict;
}

impl<F> PlacementRule for (&'static str, F)
where
    F: Fn(&PlacementContext<'_>) -> RuleVerdict,
{
    fn name(&self) -> &str {
        self.0
    }

    fn check(&self, context: &PlacementContext<'_>) -> RuleVerdict {
        (self.1)(context)
    }
}

/// A blocking validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    OutOfBounds {
        block_id: Option<BlockId>,
        position: GridPosition,
        size: GridSize,
    },
    Collision {
        block_id: Option<BlockId>,
        with: BlockId,
    },
    Immovable {
        block_id: BlockId,
    },
    NotResizable {
        block_id: BlockId,
    },
    Rule {
        rule: String,
        block_id: Option<BlockId>,
        message: String,
    },
}

fn subject(block_id: Option<&BlockId>) -> String {
    block_id.map_or_else(|| "new block".to_string(), |id| format!("block '{id}'"))
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds {
                block_id,
                position,
                size,
            } => write!(
                f,
                "{} at ({}, {}) spanning {}x{} is outside the grid",
                subject(block_id.as_ref()),
                position.column,
                position.row,
                size.column_span,
                size.row_span
            ),
            Self::Collision { block_id, with } => {
                write!(f, "{} overlaps block '{with}'", subject(block_id.as_ref()))
            }
            Self::Immovable { block_id } => write!(f, "block '{block_id}' is not movable"),
            Self::NotResizable { block_id } => write!(f, "block '{block_id}' is not resizable"),
            Self::Rule {
                rule,
                block_id,
                message,
            } => write!(f, "rule '{rule}' rejected {}: {message}", subject(block_id.as_ref())),
        }
    }
}

/// Aggregated verdict for a placement or group of placements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    /// Free anchors the caller could use instead.
    pub suggestions: Vec<GridPosition>,
}

impl ValidationReport {
    /// A passing report with no findings.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        for suggestion in other.suggestions {
            if !self.suggestions.contains(&suggestion) {
                self.suggestions.push(suggestion);
            }
        }
    }

    /// Whether any error is a collision.
    pub fn has_collision(&self) -> bool {
        self.errors
            .iter()
            .any(|issue| matches!(issue, ValidationIssue::Collision { .. }))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            return f.write_str("valid");
        }
        for (i, issue) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Runs bounds, collision, and rule checks against a board snapshot.
pub(crate) struct PlacementValidator<'a> {
    /// Coordinates used for bounds checks (rows lifted when auto-grow is on).
    pub bounds: GridCoordinateSystem,
    pub grid: &'a GridConfig,
    pub index: &'a SpatialIndex,
    pub blocks: &'a [Block],
    pub allow_overlap: bool,
    pub rules: &'a [Box<dyn PlacementRule>],
}

impl PlacementValidator<'_> {
    /// Validate a group of placements that move together.
    pub fn validate(&self, group: &[Placement<'_>]) -> ValidationReport {
        let mut report = ValidationReport::ok();
        let in_group = |id: &BlockId| group.iter().any(|p| p.block_id == Some(id));

        for (i, placement) in group.iter().enumerate() {
            let owner = placement.block_id.cloned();
            if !self.bounds.is_valid_position(placement.position, placement.size) {
                report.push_error(ValidationIssue::OutOfBounds {
                    block_id: owner.clone(),
                    position: placement.position,
                    size: placement.size,
                });
            }

            if !self.allow_overlap {
                let hits = self.index.find_collisions_excluding(
                    placement.position,
                    placement.size,
                    in_group,
                );
                let footprint = Footprint::of(placement.position, placement.size);
                let peers = group[i + 1..]
                    .iter()
                    .filter(|peer| Footprint::of(peer.position, peer.size).overlaps(&footprint))
                    .filter_map(|peer| peer.block_id.cloned());
                let mut collided = false;
                for with in hits.into_iter().chain(peers) {
                    collided = true;
                    report.push_error(ValidationIssue::Collision {
                        block_id: owner.clone(),
                        with,
                    });
                }
                if collided && group.len() == 1 {
                    if let Some(free) = self.suggest(placement) {
                        report.suggestions.push(free);
                    }
                }
            }

            self.run_rules(placement, &mut report);
        }

        report
    }

    fn suggest(&self, placement: &Placement<'_>) -> Option<GridPosition> {
        self.bounds
            .first_fit(placement.size, ScanOrder::RowMajor, 1, |candidate| {
                !self
                    .index
                    .has_collision_fast(candidate, placement.size, placement.block_id)
            })
    }

    fn run_rules(&self, placement: &Placement<'_>, report: &mut ValidationReport) {
        let context = PlacementContext {
            placement: *placement,
            blocks: self.blocks,
            grid: self.grid,
        };
        for rule in self.rules {
            let verdict = catch_unwind(AssertUnwindSafe(|| rule.check(&context)));
            match verdict {
                Ok(RuleVerdict::Pass) => {}
                Ok(RuleVerdict::Warn(message)) => report
                    .warnings
                    .push(format!("{}: {message}", rule.name())),
                Ok(RuleVerdict::Fail(message)) => report.push_error(ValidationIssue::Rule {
                    rule: rule.name().to_string(),
                    block_id: placement.block_id.cloned(),
                    message,
                }),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(
                        target: "blockgrid.validation",
                        rule = rule.name(),
                        %message,
                        "placement rule panicked"
                    );
                    report.push_error(ValidationIssue::Rule {
                        rule: rule.name().to_string(),
                        block_id: placement.block_id.cloned(),
                        message: format!("rule panicked: {message}"),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, column: u16, row: u16, w: u16, h: u16) -> Block {
        Block::new(id, "box", GridPosition::new(column, row), GridSize::new(w, h))
    }

    fn check<'a>(
        blocks: &'a [Block],
        index: &'a SpatialIndex,
        grid: &'a GridConfig,
        rules: &'a [Box<dyn PlacementRule>],
        group: &[Placement<'_>],
    ) -> ValidationReport {
        PlacementValidator {
            bounds: GridCoordinateSystem::new(*grid),
            grid,
            index,
            blocks,
            allow_overlap: false,
            rules,
        }
        .validate(group)
    }

    #[test]
    fn collision_reports_suggestion() {
        let blocks = [block("a", 1, 1, 3, 2)];
        let index = SpatialIndex::from_blocks(&blocks);
        let grid = GridConfig::default();
        let report = check(
            &blocks,
            &index,
            &grid,
            &[],
            &[Placement {
                block_id: None,
                block_type: "box",
                position: GridPosition::new(2, 1),
                size: GridSize::new(3, 2),
            }],
        );
        assert!(!report.valid);
        assert!(report.has_collision());
        assert_eq!(report.suggestions, vec![GridPosition::new(4, 1)]);
    }

    #[test]
    fn group_members_ignore_each_others_old_cells() {
        let blocks = [block("a", 1, 1, 2, 1), block("b", 3, 1, 2, 1)];
        let index = SpatialIndex::from_blocks(&blocks);
        let grid = GridConfig::default();
        let a = BlockId::from("a");
        let b = BlockId::from("b");
        let report = check(
            &blocks,
            &index,
            &grid,
            &[],
            &[
                Placement {
                    block_id: Some(&a),
                    block_type: "box",
                    position: GridPosition::new(2, 1),
                    size: GridSize::new(2, 1),
                },
                Placement {
                    block_id: Some(&b),
                    block_type: "box",
                    position: GridPosition::new(4, 1),
                    size: GridSize::new(2, 1),
                },
            ],
        );
        assert!(report.valid, "{report}");
    }

    #[test]
    fn group_members_cannot_overlap_each_other() {
        let blocks = [block("a", 1, 1, 2, 1), block("b", 1, 2, 2, 1)];
        let index = SpatialIndex::from_blocks(&blocks);
        let grid = GridConfig::default();
        let a = BlockId::from("a");
        let b = BlockId::from("b");
        let report = check(
            &blocks,
            &index,
            &grid,
            &[],
            &[
                Placement {
                    block_id: Some(&a),
                    block_type: "box",
                    position: GridPosition::new(5, 5),
                    size: GridSize::new(2, 1),
                },
                Placement {
                    block_id: Some(&b),
                    block_type: "box",
                    position: GridPosition::new(6, 5),
                    size: GridSize::new(2, 1),
                },
            ],
        );
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![ValidationIssue::Collision {
                block_id: Some(a.clone()),
                with: b.clone()
            }]
        );
    }

    #[test]
    fn rules_warn_fail_and_survive_panics() {
        let blocks: [Block; 0] = [];
        let index = SpatialIndex::new();
        let grid = GridConfig::default();
        let rules: Vec<Box<dyn PlacementRule>> = vec![
            Box::new(("top-row-warning", |ctx: &PlacementContext<'_>| {
                if ctx.placement.position.row == 1 {
                    RuleVerdict::Warn("crowded".into())
                } else {
                    RuleVerdict::Pass
                }
            })),
            Box::new(("no-charts", |ctx: &PlacementContext<'_>| {
                if ctx.placement.block_type == "chart" {
                    RuleVerdict::Fail("charts disabled".into())
                } else {
                    RuleVerdict::Pass
                }
            })),
            Box::new(("explodes", |_: &PlacementContext<'_>| -> RuleVerdict {
                panic!("boom")
            })),
        ];
        let report = check(
            &blocks,
            &index,
            &grid,
            &rules,
            &[Placement {
                block_id: None,
                block_type: "chart",
                position: GridPosition::new(1, 1),
                size: GridSize::new(1, 1),
            }],
        );
        assert!(!report.valid);
        assert_eq!(report.warnings, vec!["top-row-warning: crowded".to_string()]);
        assert_eq!(report.errors.len(), 2);
        assert!(report.to_string().contains("rule panicked: boom"));
    }

    #[test]
    fn out_of_bounds_is_reported() {
        let blocks: [Block; 0] = [];
        let index = SpatialIndex::new();
        let grid = GridConfig::default().with_rows(3);
        let report = check(
            &blocks,
            &index,
            &grid,
            &[],
            &[Placement {
                block_id: None,
                block_type: "box",
                position: GridPosition::new(1, 3),
                size: GridSize::new(1, 2),
            }],
        );
        assert!(matches!(
            report.errors.as_slice(),
            [ValidationIssue::OutOfBounds { .. }]
        ));
    }
}
