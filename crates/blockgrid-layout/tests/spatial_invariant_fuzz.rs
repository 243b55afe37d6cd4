//! Property/fuzz-style invariants for the spatial index and reflow planner.
//!
//! Random operation streams run against the public layout API. After every
//! step the cell-bucket index must agree with a brute-force footprint scan,
//! and every successful reflow plan must leave the layout overlap-free.

use blockgrid_layout::{
    ArrangeStrategy, Block, BlockId, GridConfig, GridCoordinateSystem, GridPosition, GridSize,
    ReflowEngine, ReflowMode, SpatialIndex, apply_plan, arrange,
};
use proptest::prelude::*;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone)]
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn next_u16_range(&mut self, min: u16, max: u16) -> u16 {
        debug_assert!(min <= max);
        if min == max {
            return min;
        }
        let span = u64::from(max - min + 1);
        min + (self.next_u64() % span) as u16
    }

    fn choose_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.next_u64() % len as u64) as usize
    }

    fn choose_bool(&mut self) -> bool {
        (self.next_u64() & 1) == 0
    }
}

const COLUMNS: u16 = 12;

fn grid() -> GridConfig {
    GridConfig::new(COLUMNS, 60.0, 8.0)
}

fn random_size(rng: &mut Lcg) -> GridSize {
    GridSize::new(rng.next_u16_range(1, 4), rng.next_u16_range(1, 3))
}

fn brute_force_collides(blocks: &[Block], position: GridPosition, size: GridSize) -> bool {
    GridCoordinateSystem::new(grid()).collides(position, size, None, blocks)
}

fn assert_overlap_free(blocks: &[Block], context: &str) {
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            assert!(
                !a.footprint().overlaps(&b.footprint()),
                "{context}: {} overlaps {}",
                a.id,
                b.id
            );
        }
    }
}

fn assert_index_matches(index: &SpatialIndex, blocks: &[Block], rng: &mut Lcg) {
    assert!(index.is_consistent(), "bucket map diverged from footprints");
    assert_eq!(index.len(), blocks.len());
    for _ in 0..8 {
        let probe = GridPosition::new(rng.next_u16_range(1, COLUMNS), rng.next_u16_range(1, 20));
        let size = GridSize::new(1, 1);
        assert_eq!(
            index.has_collision_fast(probe, size, None),
            brute_force_collides(blocks, probe, size),
            "probe {probe:?}"
        );
    }
}

/// Build an overlap-free board by first-fit placement.
fn seeded_board(rng: &mut Lcg, count: usize) -> Vec<Block> {
    let coords = GridCoordinateSystem::new(grid());
    let mut blocks: Vec<Block> = Vec::with_capacity(count);
    for n in 0..count {
        let size = random_size(rng);
        let position = coords.find_available_position(size, &blocks);
        let block = Block::new(format!("b{n}"), "box", position, size)
            .with_movable(rng.next_u16_range(0, 9) != 0);
        blocks.push(block);
    }
    blocks
}

fn run_index_sequence(seed: u64, steps: usize) {
    let mut rng = Lcg::new(seed);
    let mut blocks: Vec<Block> = Vec::new();
    let mut index = SpatialIndex::new();
    let mut next_id = 0usize;

    for _ in 0..steps {
        match rng.next_u16_range(0, 3) {
            0 | 1 => {
                let size = random_size(&mut rng);
                let position = GridPosition::new(
                    rng.next_u16_range(1, COLUMNS - size.column_span + 1),
                    rng.next_u16_range(1, 20),
                );
                let id = BlockId::new(format!("n{next_id}"));
                next_id += 1;
                index.add_block(&id, position, size);
                blocks.push(Block::new(id, "box", position, size));
            }
            2 if !blocks.is_empty() => {
                let at = rng.choose_index(blocks.len());
                let size = random_size(&mut rng);
                let position = GridPosition::new(
                    rng.next_u16_range(1, COLUMNS - size.column_span + 1),
                    rng.next_u16_range(1, 20),
                );
                blocks[at].grid_position = position;
                blocks[at].grid_size = size;
                index.update_block(&blocks[at].id, position, size);
            }
            _ if !blocks.is_empty() => {
                let at = rng.choose_index(blocks.len());
                let removed = blocks.swap_remove(at);
                assert!(index.remove_block(&removed.id));
            }
            _ => {}
        }
        assert_index_matches(&index, &blocks, &mut rng);
    }

    let rebuilt = SpatialIndex::from_blocks(&blocks);
    assert_eq!(rebuilt.bucket_count(), index.bucket_count());
}

fn run_reflow_sequence(seed: u64, steps: usize, mode: ReflowMode) {
    let mut rng = Lcg::new(seed);
    let mut blocks = seeded_board(&mut rng, 10);
    let engine = ReflowEngine::new(mode, grid());
    let coords = GridCoordinateSystem::new(grid());

    for step in 0..steps {
        let anchor = blocks[rng.choose_index(blocks.len())].clone();
        if !anchor.movable {
            continue;
        }
        let target = coords.clamp_position(
            anchor.grid_position.shifted(
                i32::from(rng.next_u16_range(0, 6)) - 3,
                i32::from(rng.next_u16_range(0, 6)) - 3,
            ),
            anchor.grid_size,
        );
        let size = if rng.choose_bool() {
            anchor.grid_size
        } else {
            random_size(&mut rng)
        };
        let target = coords.clamp_position(target, size);

        let Ok(plan) = engine.plan(&anchor.id, target, size, &blocks) else {
            continue;
        };

        let mut seen = FxHashSet::default();
        for relocation in &plan.relocations {
            assert!(
                seen.insert(relocation.block_id.clone()),
                "step {step}, seed {seed}: {} relocated twice",
                relocation.block_id
            );
            let block = blocks
                .iter()
                .find(|block| block.id == relocation.block_id)
                .expect("relocated block exists");
            assert!(block.movable, "immovable {} relocated", block.id);
            assert!(coords.is_valid_position(relocation.to, block.grid_size));
        }

        apply_plan(&plan, &mut blocks);
        assert_overlap_free(&blocks, &format!("seed {seed}, step {step}, mode {mode:?}"));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn spatial_index_tracks_brute_force(seed in any::<u64>(), steps in 20usize..120) {
        run_index_sequence(seed, steps);
    }

    #[test]
    fn push_away_plans_stay_overlap_free(seed in any::<u64>(), steps in 10usize..60) {
        run_reflow_sequence(seed, steps, ReflowMode::PushAway);
    }

    #[test]
    fn smart_fill_plans_stay_overlap_free(seed in any::<u64>(), steps in 10usize..60) {
        run_reflow_sequence(seed, steps, ReflowMode::SmartFill);
    }

    #[test]
    fn axis_shift_plans_stay_overlap_free(seed in any::<u64>(), steps in 10usize..60) {
        run_reflow_sequence(seed, steps, ReflowMode::AxisShift);
    }

    #[test]
    fn arrange_strategies_stay_overlap_free(seed in any::<u64>(), count in 1usize..16) {
        let mut rng = Lcg::new(seed);
        let mut blocks = seeded_board(&mut rng, count);
        for strategy in [
            ArrangeStrategy::TopLeft,
            ArrangeStrategy::Masonry,
            ArrangeStrategy::ByRow,
            ArrangeStrategy::ByColumn,
        ] {
            let relocations = arrange(&blocks, &grid(), strategy);
            for relocation in &relocations {
                let block = blocks
                    .iter_mut()
                    .find(|block| block.id == relocation.block_id)
                    .expect("relocated block exists");
                prop_assert!(block.movable);
                block.grid_position = relocation.to;
            }
            assert_overlap_free(&blocks, &format!("arrange {strategy:?}"));
        }
    }
}

#[test]
fn fuzz_seed_corpus_preserves_invariants() {
    let seeds = [
        0_u64,
        1,
        2,
        3,
        5,
        8,
        13,
        21,
        34,
        55,
        89,
        144,
        u32::MAX as u64,
        u64::MAX,
    ];

    for seed in seeds {
        run_index_sequence(seed, 150);
        run_reflow_sequence(seed, 80, ReflowMode::PushAway);
        run_reflow_sequence(seed, 80, ReflowMode::SmartFill);
        run_reflow_sequence(seed, 80, ReflowMode::AxisShift);
    }
}

#[test]
fn first_fit_lands_beside_existing_block() {
    let coords = GridCoordinateSystem::new(grid());
    let existing = [Block::new(
        "a",
        "box",
        GridPosition::new(1, 1),
        GridSize::new(3, 2),
    )];
    assert_eq!(
        coords.find_available_position(GridSize::new(3, 2), &existing),
        GridPosition::new(4, 1)
    );
}
