#![forbid(unsafe_code)]

//! BlockGrid public facade crate.
//!
//! Re-exports the common types from the internal crates and adds a small
//! prelude plus a unified [`Error`] for applications that touch several
//! layers at once.
//!
//! ```
//! use blockgrid::prelude::*;
//!
//! let mut board = Board::new(BoardConfig::default())?;
//! let id = board.add_block(BlockSpec::new("note").sized(GridSize::new(2, 1)))?;
//! board.move_block(&id, GridPosition::new(3, 2))?;
//! assert!(board.undo()?);
//! # Ok::<(), blockgrid::Error>(())
//! ```

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use blockgrid_core::event::{
    InputEvent, KeyCode, KeyEvent, Modifiers, PointerButton, PointerEvent, PointerEventKind,
};
pub use blockgrid_core::gesture::{GestureConfig, PressTracker};

// --- Layout re-exports -----------------------------------------------------

pub use blockgrid_layout::{
    ArrangeStrategy, Block, BlockId, ContainerBox, GridConfig, GridCoordinateSystem, GridPosition,
    GridSize, PixelRect, Point, ReflowMode, SizeConstraints, SpatialIndex,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use blockgrid_runtime::{
    BatchOperation, BatchOutcome, BatchStrategy, BlockSpec, BlockUpdate, Board, BoardConfig,
    BoardDocument, BoardEvent, ConfigError, DocumentError, InteractionEffect, InteractionError,
    InteractionMachine, InteractionState, ProposedChange, SchedulerMode, Subscription,
    TaskOutcome, TaskScheduler, VisualMode, VisualSurface,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for BlockGrid applications.
#[derive(Debug)]
pub enum Error {
    /// Grid geometry rejected.
    Grid(blockgrid_layout::GridConfigError),
    #[cfg(feature = "runtime")]
    Board(blockgrid_runtime::BoardError),
    #[cfg(feature = "runtime")]
    Config(ConfigError),
    #[cfg(feature = "runtime")]
    Document(DocumentError),
    #[cfg(feature = "runtime")]
    Interaction(InteractionError),
    /// Config path with an extension other than `toml` or `json`.
    UnsupportedFormat(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Board(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Config(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Document(err) => write!(f, "{err}"),
            #[cfg(feature = "runtime")]
            Self::Interaction(err) => write!(f, "{err}"),
            Self::UnsupportedFormat(path) => write!(f, "unsupported config format: {path}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Grid(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Board(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Config(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Document(err) => Some(err),
            #[cfg(feature = "runtime")]
            Self::Interaction(err) => Some(err),
            Self::UnsupportedFormat(_) => None,
        }
    }
}

impl From<blockgrid_layout::GridConfigError> for Error {
    fn from(err: blockgrid_layout::GridConfigError) -> Self {
        Self::Grid(err)
    }
}

#[cfg(feature = "runtime")]
impl From<blockgrid_runtime::BoardError> for Error {
    fn from(err: blockgrid_runtime::BoardError) -> Self {
        Self::Board(err)
    }
}

#[cfg(feature = "runtime")]
impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

#[cfg(feature = "runtime")]
impl From<DocumentError> for Error {
    fn from(err: DocumentError) -> Self {
        Self::Document(err)
    }
}

#[cfg(feature = "runtime")]
impl From<InteractionError> for Error {
    fn from(err: InteractionError) -> Self {
        Self::Interaction(err)
    }
}

/// Standard result type for BlockGrid APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Loading ----------------------------------------------------------------

/// Read a [`BoardConfig`] from `path`, picking the parser from the file
/// extension.
#[cfg(feature = "runtime")]
pub fn load_config(path: impl AsRef<std::path::Path>) -> Result<BoardConfig> {
    let path = path.as_ref();
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => BoardConfig::from_toml_file(path)?,
        Some("json") => BoardConfig::from_json_file(path)?,
        _ => return Err(Error::UnsupportedFormat(path.display().to_string())),
    };
    Ok(config.validated()?)
}

/// Build an empty board from a config file.
#[cfg(feature = "runtime")]
pub fn open_board(path: impl AsRef<std::path::Path>) -> Result<Board> {
    Ok(Board::new(load_config(path)?)?)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Block, BlockId, ContainerBox, Error, GridConfig, GridPosition, GridSize, InputEvent,
        KeyCode, KeyEvent, Modifiers, PointerEvent, ReflowMode, Result,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{
        BatchOperation, BatchStrategy, BlockSpec, Board, BoardConfig, BoardEvent,
        InteractionMachine, VisualMode,
    };

    pub use crate::{core, layout};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use blockgrid_core as core;
pub use blockgrid_layout as layout;
#[cfg(feature = "runtime")]
pub use blockgrid_runtime as runtime;

#[cfg(all(test, feature = "runtime"))]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn unknown_extension_is_rejected_before_io() {
        let err = load_config("board.yaml").expect_err("yaml");
        assert!(matches!(err, Error::UnsupportedFormat(ref p) if p == "board.yaml"));
        assert!(err.source().is_none());
    }

    #[test]
    fn missing_file_surfaces_config_error() {
        let err = open_board("/nonexistent/blockgrid/board.toml").expect_err("missing");
        assert!(matches!(err, Error::Config(ConfigError::Io(_))));
        assert!(err.source().is_some());
    }

    #[test]
    fn board_errors_convert() {
        let mut board = Board::new(BoardConfig::default()).expect("board");
        let run = |board: &mut Board| -> Result<()> {
            board.move_block(&BlockId::new("ghost"), GridPosition::new(1, 1))?;
            Ok(())
        };
        let err = run(&mut board).expect_err("unknown block");
        assert!(matches!(err, Error::Board(_)));
        assert!(err.to_string().contains("ghost"));
    }
}
