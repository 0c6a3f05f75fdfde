use thiserror::Error;

use crate::state::{
    board::{Board, CELL_COUNT, Mark},
    session::{Outcome, SessionStatus},
};

/// A move or join that breaks the game rules. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// The acting participant does not hold the mark whose turn it is.
    #[error("not your turn")]
    NotYourTurn,
    /// The targeted cell already holds a mark.
    #[error("cell {cell} is already taken")]
    CellOccupied {
        /// Targeted cell.
        cell: usize,
    },
    /// The targeted cell is not on the board.
    #[error("cell {cell} is outside the board (expected 0..{CELL_COUNT})")]
    CellOutOfRange {
        /// Targeted cell.
        cell: usize,
    },
    /// Moves are only accepted while the game is active.
    #[error("game is not active (status: {status})")]
    GameNotActive {
        /// Status at the time of the attempt.
        status: SessionStatus,
    },
    /// Only waiting sessions can be joined.
    #[error("session is already full or finished")]
    NotJoinable {
        /// Status at the time of the attempt.
        status: SessionStatus,
    },
}

/// What happens to the game after a mark has been placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Nobody won yet and free cells remain; `next` moves now.
    Continue {
        /// Mark to move next.
        next: Mark,
    },
    /// The game ended with the given outcome.
    Finished(Outcome),
}

/// Place `mark` at `cell` and evaluate the resulting position.
///
/// The board is returned by value; the input is left untouched on error.
pub fn play_cell(board: &Board, cell: usize, mark: Mark) -> Result<(Board, Progress), RuleViolation> {
    if cell >= CELL_COUNT {
        return Err(RuleViolation::CellOutOfRange { cell });
    }
    if !board.is_free(cell) {
        return Err(RuleViolation::CellOccupied { cell });
    }

    let next_board = board.with_mark(cell, mark);
    let progress = match next_board.winner() {
        Some(winner) => Progress::Finished(Outcome::winner(winner)),
        None if next_board.is_full() => Progress::Finished(Outcome::Draw),
        None => Progress::Continue {
            next: mark.opponent(),
        },
    };

    Ok((next_board, progress))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placing_on_empty_cell_flips_turn() {
        let (board, progress) = play_cell(&Board::new(), 4, Mark::X).unwrap();
        assert_eq!(board.get(4), Some(Mark::X));
        assert_eq!(progress, Progress::Continue { next: Mark::O });
    }

    #[test]
    fn occupied_cell_is_rejected() {
        let (board, _) = play_cell(&Board::new(), 0, Mark::X).unwrap();
        let err = play_cell(&board, 0, Mark::O).unwrap_err();
        assert_eq!(err, RuleViolation::CellOccupied { cell: 0 });
        assert_eq!(board.get(0), Some(Mark::X));
    }

    #[test]
    fn out_of_range_cell_is_rejected() {
        let err = play_cell(&Board::new(), 9, Mark::X).unwrap_err();
        assert_eq!(err, RuleViolation::CellOutOfRange { cell: 9 });
    }

    #[test]
    fn completing_a_line_finishes_with_winner() {
        let mut board = Board::new();
        for (cell, mark) in [(0, Mark::O), (3, Mark::X), (4, Mark::O), (5, Mark::X)] {
            board = play_cell(&board, cell, mark).unwrap().0;
        }
        let (_, progress) = play_cell(&board, 8, Mark::O).unwrap();
        assert_eq!(progress, Progress::Finished(Outcome::WinnerO));
    }

    #[test]
    fn last_free_cell_without_line_is_a_draw() {
        let sequence = [
            Mark::X,
            Mark::O,
            Mark::X,
            Mark::O,
            Mark::X,
            Mark::O,
            Mark::O,
            Mark::X,
        ];
        let mut board = Board::new();
        for (cell, mark) in sequence.into_iter().enumerate() {
            board = play_cell(&board, cell, mark).unwrap().0;
        }
        let (board, progress) = play_cell(&board, 8, Mark::O).unwrap();
        assert!(board.is_full());
        assert_eq!(progress, Progress::Finished(Outcome::Draw));
    }
}
