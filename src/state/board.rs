//! Board representation and the win-line scan shared by local and online games.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of cells on a tic-tac-toe board.
pub const CELL_COUNT: usize = 9;

/// Rows, then columns, then diagonals. The scan order is part of the contract.
const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Symbol a player places on the board. `X` always moves first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Mark {
    /// First player.
    #[default]
    X,
    /// Second player.
    O,
}

impl Mark {
    /// The mark that plays after this one.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// Single-letter representation used in messages and storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nine cells in row-major order, each empty or holding a [`Mark`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Mark>; CELL_COUNT],
}

impl Board {
    /// An all-empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a board from explicit cell contents.
    pub fn from_cells(cells: [Option<Mark>; CELL_COUNT]) -> Self {
        Self { cells }
    }

    /// Contents of `cell`, or `None` when empty or out of range.
    pub fn get(&self, cell: usize) -> Option<Mark> {
        self.cells.get(cell).copied().flatten()
    }

    /// Whether `cell` is on the board and still empty.
    pub fn is_free(&self, cell: usize) -> bool {
        cell < CELL_COUNT && self.cells[cell].is_none()
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Option<Mark>; CELL_COUNT] {
        &self.cells
    }

    /// Number of cells holding `mark`.
    pub fn count(&self, mark: Mark) -> usize {
        self.cells.iter().filter(|cell| **cell == Some(mark)).count()
    }

    /// True once no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Return a copy of the board with `mark` written at `cell`.
    ///
    /// Callers validate the cell beforehand; see [`crate::state::rules::play_cell`].
    pub(crate) fn with_mark(mut self, cell: usize, mark: Mark) -> Self {
        self.cells[cell] = Some(mark);
        self
    }

    /// Mark of the first fully-matched line, if any.
    pub fn winner(&self) -> Option<Mark> {
        winner_check(self)
    }
}

/// Scan the eight winning lines in a fixed order and return the mark occupying
/// the first uniform, non-empty one.
pub fn winner_check(board: &Board) -> Option<Mark> {
    WINNING_LINES.iter().find_map(|[a, b, c]| {
        let mark = board.cells[*a]?;
        (board.cells[*b] == Some(mark) && board.cells[*c] == Some(mark)).then_some(mark)
    })
}
