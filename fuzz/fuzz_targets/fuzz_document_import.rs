#![no_main]

use blockgrid_runtime::{BlockSpec, Board, BoardConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(mut board) = Board::new(BoardConfig::default()) else {
        return;
    };
    let _ = board.add_block(BlockSpec::new("seed"));
    let before = board.export_data();

    match board.import_json(text) {
        Ok(()) => {
            // Accepted documents round-trip and never carry history.
            assert!(!board.can_undo());
            assert!(board.index().is_consistent());
            let again = board.export_json().expect("export after import");
            let mut restored = Board::new(BoardConfig::default()).expect("board");
            restored.import_json(&again).expect("re-import");
            assert_eq!(restored.blocks(), board.blocks());
        }
        Err(_) => {
            // Rejected documents leave the board untouched.
            assert_eq!(board.export_data(), before);
        }
    }
});
