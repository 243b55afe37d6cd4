#![no_main]

use arbitrary::Arbitrary;
use blockgrid_core::event::{InputEvent, KeyCode, KeyEvent, PointerEvent};
use blockgrid_core::geometry::ContainerBox;
use blockgrid_layout::{GridPosition, GridSize};
use blockgrid_runtime::{BlockSpec, Board, BoardConfig, InteractionMachine, InteractionState};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Step {
    Down { x: u16, y: u16, pointer: u8 },
    Move { x: u16, y: u16, pointer: u8 },
    Up { x: u16, y: u16, pointer: u8 },
    Key(u8),
    Blur,
    ForceCancel,
}

fn key(code: u8) -> KeyEvent {
    KeyEvent::new(match code % 8 {
        0 => KeyCode::Left,
        1 => KeyCode::Right,
        2 => KeyCode::Up,
        3 => KeyCode::Down,
        4 => KeyCode::Escape,
        5 => KeyCode::Delete,
        6 => KeyCode::Tab,
        _ => KeyCode::Enter,
    })
}

fuzz_target!(|steps: Vec<Step>| {
    let config = BoardConfig {
        drag_out: true,
        ..BoardConfig::default()
    };
    let Ok(mut board) = Board::new(config) else {
        return;
    };
    board.set_container(ContainerBox::from_size(808.0, 600.0));
    for (i, column) in [1u16, 4, 7, 10].into_iter().enumerate() {
        let _ = board.add_block(
            BlockSpec::new("box")
                .with_id(format!("b{i}"))
                .at(GridPosition::new(column, 1 + i as u16))
                .sized(GridSize::new(2, 2)),
        );
    }
    let mut machine = InteractionMachine::new();

    for step in steps.into_iter().take(512) {
        let event = match step {
            Step::Down { x, y, pointer } => {
                PointerEvent::down(f64::from(x % 1000), f64::from(y % 800))
                    .with_pointer_id(u32::from(pointer % 2))
            }
            Step::Move { x, y, pointer } => {
                PointerEvent::moved(f64::from(x % 1000), f64::from(y % 800))
                    .with_pointer_id(u32::from(pointer % 2))
            }
            Step::Up { x, y, pointer } => {
                PointerEvent::up(f64::from(x % 1000), f64::from(y % 800))
                    .with_pointer_id(u32::from(pointer % 2))
            }
            Step::Key(code) => {
                let _ = machine.handle_event(&mut board, &InputEvent::Key(key(code)));
                continue;
            }
            Step::Blur => {
                let _ = machine.handle_event(&mut board, &InputEvent::Blur);
                continue;
            }
            Step::ForceCancel => {
                let _ = machine.force_cancel(&mut board);
                assert_eq!(machine.state(), InteractionState::Idle);
                continue;
            }
        };
        let _ = machine.handle_event(&mut board, &InputEvent::Pointer(event));

        assert!(board.index().is_consistent(), "index drifted");
        for block in board.blocks() {
            let hits = board
                .index()
                .find_potential_collisions(block.grid_position, block.grid_size);
            assert_eq!(hits.len(), 1, "{} overlaps another block", block.id);
        }
    }
});
