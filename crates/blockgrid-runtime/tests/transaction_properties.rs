//! Board-level invariants under random operation streams.
//!
//! Every public mutation must keep the spatial index in step with the block
//! list, keep the board overlap-free, and round-trip through export/import.
//! A no-op transaction must leave no trace at all.

use std::cell::Cell;
use std::rc::Rc;

use blockgrid_layout::{BlockId, GridPosition, GridSize};
use blockgrid_runtime::{
    BatchOperation, BatchStrategy, BlockSpec, Board, BoardConfig, ProposedChange, VisualMode,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0xD1B5_4A32_D192_ED03,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 11
    }

    fn range(&mut self, min: u16, max: u16) -> u16 {
        min + (self.next_u64() % u64::from(max - min + 1)) as u16
    }

    fn pick(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

fn assert_board_invariants(board: &Board) {
    let index = board.index();
    assert!(index.is_consistent(), "index buckets drifted");
    assert_eq!(index.len(), board.len());
    for block in board.blocks() {
        let hits = index.find_potential_collisions(block.grid_position, block.grid_size);
        assert!(hits.contains(&block.id), "{} missing from its own cells", block.id);
        assert_eq!(
            hits.len(),
            1,
            "{} overlaps {:?}",
            block.id,
            hits.iter().filter(|id| **id != block.id).collect::<Vec<_>>()
        );
        assert!(board.coords().is_valid_position(block.grid_position, block.grid_size));
    }
}

fn random_ops(board: &mut Board, seed: u64, steps: usize) {
    let mut rng = Lcg::new(seed);
    for _ in 0..steps {
        let ids: Vec<BlockId> = board.blocks().iter().map(|b| b.id.clone()).collect();
        match rng.pick(8) {
            0 | 1 => {
                let size = GridSize::new(rng.range(1, 4), rng.range(1, 3));
                let _ = board.add_block(BlockSpec::new("box").sized(size));
            }
            2 if !ids.is_empty() => {
                let id = &ids[rng.pick(ids.len())];
                let target = GridPosition::new(rng.range(1, 12), rng.range(1, 8));
                let _ = board.move_block(id, target);
            }
            3 if !ids.is_empty() => {
                let id = &ids[rng.pick(ids.len())];
                let _ = board.resize_block(id, GridSize::new(rng.range(1, 5), rng.range(1, 4)));
            }
            4 if !ids.is_empty() => {
                let id = ids[rng.pick(ids.len())].clone();
                let _ = board.remove_block(&id);
            }
            5 => {
                let _ = board.undo();
            }
            6 => {
                let _ = board.redo();
            }
            _ if ids.len() >= 2 => {
                let ops = vec![
                    BatchOperation::Move {
                        block_id: ids[0].clone(),
                        position: GridPosition::new(rng.range(1, 12), rng.range(1, 8)),
                    },
                    BatchOperation::Resize {
                        block_id: ids[1].clone(),
                        size: GridSize::new(rng.range(1, 3), rng.range(1, 3)),
                    },
                ];
                let strategy = match rng.pick(3) {
                    0 => BatchStrategy::AllOrNothing,
                    1 => BatchStrategy::BestEffort,
                    _ => BatchStrategy::FailFast,
                };
                board.apply_batch(ops, strategy);
            }
            _ => {}
        }
        assert_board_invariants(board);
    }
}

#[test]
fn lcg_operation_streams_keep_invariants() {
    for seed in 0..24u64 {
        let mut board = Board::new(BoardConfig::default()).expect("board");
        random_ops(&mut board, seed, 200);
    }
}

#[test]
fn lcg_streams_with_reflow_keep_invariants() {
    use blockgrid_layout::ReflowMode;

    for (seed, mode) in [
        (101u64, ReflowMode::PushAway),
        (202, ReflowMode::SmartFill),
        (303, ReflowMode::AxisShift),
    ] {
        let mut board = Board::new(BoardConfig::default()).expect("board");
        board.set_drag_reflow(mode);
        let mut rng = Lcg::new(seed);
        for _ in 0..40 {
            let size = GridSize::new(rng.range(1, 3), rng.range(1, 2));
            let _ = board.add_block(BlockSpec::new("box").sized(size));
        }
        for _ in 0..150 {
            let ids: Vec<BlockId> = board.blocks().iter().map(|b| b.id.clone()).collect();
            let id = &ids[rng.pick(ids.len())];
            let target = GridPosition::new(rng.range(1, 12), rng.range(1, 10));
            let _ = board.move_with_reflow(id, target);
            assert_board_invariants(&board);
        }
    }
}

proptest! {
    #[test]
    fn committing_current_positions_changes_nothing(seed in any::<u64>(), steps in 1usize..60) {
        let mut board = Board::new(BoardConfig::default()).expect("board");
        random_ops(&mut board, seed, steps);

        let before = board.export_data();
        let revision = board.revision();
        let history = board.history().len();
        let events = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&events);
        let _guard = board.subscribe(move |_| counter.set(counter.get() + 1));

        let changes: Vec<ProposedChange> = board
            .blocks()
            .iter()
            .map(|b| ProposedChange::place(b.id.clone(), b.grid_position, b.grid_size))
            .collect();
        let plan = board.plan(&changes).expect("plan");
        prop_assert!(plan.is_empty());
        let summary = board.commit(plan, VisualMode::Flip).expect("commit");

        prop_assert_eq!(summary.moved, 0);
        prop_assert_eq!(board.export_data(), before);
        prop_assert_eq!(board.revision(), revision);
        prop_assert_eq!(board.history().len(), history);
        prop_assert_eq!(events.get(), 0);
    }

    #[test]
    fn export_import_round_trips(seed in any::<u64>(), steps in 0usize..80) {
        let mut board = Board::new(BoardConfig::default()).expect("board");
        random_ops(&mut board, seed, steps);
        let json = board.export_json().expect("export");

        let mut restored = Board::new(BoardConfig::default()).expect("board");
        restored.import_json(&json).expect("import");

        prop_assert_eq!(restored.blocks(), board.blocks());
        prop_assert_eq!(restored.config().grid, board.config().grid);
        prop_assert!(!restored.can_undo());
        assert_board_invariants(&restored);
    }
}
