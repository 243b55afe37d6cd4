#![no_main]

use arbitrary::Arbitrary;
use blockgrid_layout::{BlockId, GridPosition, GridSize, ReflowMode};
use blockgrid_runtime::{BatchOperation, BatchStrategy, BlockSpec, Board, BoardConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { w: u8, h: u8 },
    Move { pick: u8, column: u8, row: u8 },
    Reflow { pick: u8, column: u8, row: u8 },
    Resize { pick: u8, w: u8, h: u8 },
    Remove { pick: u8 },
    Batch { pick: u8, column: u8, row: u8, strategy: u8 },
    Undo,
    Redo,
}

#[derive(Debug, Arbitrary)]
struct Input {
    reflow: u8,
    ops: Vec<Op>,
}

fn pick(ids: &[BlockId], n: u8) -> Option<&BlockId> {
    if ids.is_empty() {
        None
    } else {
        ids.get(usize::from(n) % ids.len())
    }
}

// Columns past the grid edge are kept on purpose so out-of-range paths run.
fn position(column: u8, row: u8) -> GridPosition {
    GridPosition::new(u16::from(column % 16) + 1, u16::from(row % 16) + 1)
}

fuzz_target!(|input: Input| {
    let Ok(mut board) = Board::new(BoardConfig::default()) else {
        return;
    };
    board.set_drag_reflow(match input.reflow % 4 {
        0 => ReflowMode::None,
        1 => ReflowMode::PushAway,
        2 => ReflowMode::SmartFill,
        _ => ReflowMode::AxisShift,
    });

    for op in input.ops.into_iter().take(256) {
        let ids: Vec<BlockId> = board.blocks().iter().map(|b| b.id.clone()).collect();
        match op {
            Op::Add { w, h } => {
                let size = GridSize::new(u16::from(w % 5) + 1, u16::from(h % 4) + 1);
                let _ = board.add_block(BlockSpec::new("box").sized(size));
            }
            Op::Move { pick: n, column, row } => {
                if let Some(id) = pick(&ids, n) {
                    let _ = board.move_block(id, position(column, row));
                }
            }
            Op::Reflow { pick: n, column, row } => {
                if let Some(id) = pick(&ids, n) {
                    let _ = board.move_with_reflow(id, position(column, row));
                }
            }
            Op::Resize { pick: n, w, h } => {
                if let Some(id) = pick(&ids, n) {
                    let size = GridSize::new(u16::from(w % 14), u16::from(h % 6));
                    let _ = board.resize_block(id, size);
                }
            }
            Op::Remove { pick: n } => {
                if let Some(id) = pick(&ids, n).cloned() {
                    let _ = board.remove_block(&id);
                }
            }
            Op::Batch { pick: n, column, row, strategy } => {
                let Some(id) = pick(&ids, n).cloned() else {
                    continue;
                };
                let strategy = match strategy % 3 {
                    0 => BatchStrategy::AllOrNothing,
                    1 => BatchStrategy::BestEffort,
                    _ => BatchStrategy::FailFast,
                };
                board.apply_batch(
                    vec![
                        BatchOperation::Move {
                            block_id: id.clone(),
                            position: position(column, row),
                        },
                        BatchOperation::Remove(BlockId::new("missing")),
                    ],
                    strategy,
                );
            }
            Op::Undo => {
                let _ = board.undo();
            }
            Op::Redo => {
                let _ = board.redo();
            }
        }

        // Post-conditions that must always hold:
        let index = board.index();
        assert!(index.is_consistent(), "index drifted");
        assert_eq!(index.len(), board.len(), "index and block list disagree");
        for block in board.blocks() {
            let hits = index.find_potential_collisions(block.grid_position, block.grid_size);
            assert_eq!(hits.len(), 1, "{} overlaps another block", block.id);
            assert!(
                board
                    .coords()
                    .is_valid_position(block.grid_position, block.grid_size),
                "{} out of bounds",
                block.id
            );
        }
    }
});
