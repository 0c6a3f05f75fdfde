//! Single-instance game played on one device, with a running scoreboard.

use crate::state::{
    board::{Board, Mark},
    rules::{Progress, RuleViolation, play_cell},
    session::{Outcome, SessionStatus},
};

/// How the two marks are labelled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LocalMode {
    /// One person plays both marks.
    #[default]
    SinglePlayer,
    /// Two people share the device; empty names fall back to `Player X` / `Player O`.
    TwoPlayer {
        /// Name for X.
        player_x: String,
        /// Name for O.
        player_o: String,
    },
}

/// Wins per mark across consecutive local games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scoreboard {
    /// Games won by X.
    pub x: u32,
    /// Games won by O.
    pub o: u32,
}

impl Scoreboard {
    fn credit(&mut self, mark: Mark) {
        match mark {
            Mark::X => self.x += 1,
            Mark::O => self.o += 1,
        }
    }
}

/// Ephemeral game with no identity and no persistence. Starts active, X to move.
#[derive(Debug, Clone, Default)]
pub struct LocalGame {
    mode: LocalMode,
    board: Board,
    current_turn: Mark,
    outcome: Option<Outcome>,
    scores: Scoreboard,
}

impl LocalGame {
    /// Start a fresh game in `mode` with zeroed scores.
    pub fn new(mode: LocalMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> Mark {
        self.current_turn
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn scores(&self) -> Scoreboard {
        self.scores
    }

    pub fn mode(&self) -> &LocalMode {
        &self.mode
    }

    /// Place the current mark at `cell`.
    ///
    /// A win credits the winner on the scoreboard; the game then refuses further moves.
    pub fn play(&mut self, cell: usize) -> Result<Progress, RuleViolation> {
        if self.outcome.is_some() {
            return Err(RuleViolation::GameNotActive {
                status: SessionStatus::Finished,
            });
        }

        let (board, progress) = play_cell(&self.board, cell, self.current_turn)?;
        self.board = board;
        match progress {
            Progress::Continue { next } => self.current_turn = next,
            Progress::Finished(outcome) => {
                if let Some(winner) = outcome.winning_mark() {
                    self.scores.credit(winner);
                }
                self.outcome = Some(outcome);
            }
        }

        Ok(progress)
    }

    /// Clear the board for another round, keeping the scores.
    pub fn new_game(&mut self) {
        self.board = Board::new();
        self.current_turn = Mark::X;
        self.outcome = None;
    }

    pub fn reset_scores(&mut self) {
        self.scores = Scoreboard::default();
    }

    /// Label for `mark` in the current mode.
    pub fn player_name(&self, mark: Mark) -> String {
        let configured = match (&self.mode, mark) {
            (LocalMode::SinglePlayer, _) => "",
            (LocalMode::TwoPlayer { player_x, .. }, Mark::X) => player_x.trim(),
            (LocalMode::TwoPlayer { player_o, .. }, Mark::O) => player_o.trim(),
        };
        if configured.is_empty() {
            format!("Player {mark}")
        } else {
            configured.to_string()
        }
    }

    /// `Winner: name`, `It's a draw!` or `Next player: name`.
    pub fn status_line(&self) -> String {
        match self.outcome {
            Some(Outcome::Draw) => "It's a draw!".into(),
            Some(outcome) => match outcome.winning_mark() {
                Some(mark) => format!("Winner: {}", self.player_name(mark)),
                None => "It's a draw!".into(),
            },
            None => format!("Next player: {}", self.player_name(self.current_turn)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_all(game: &mut LocalGame, cells: &[usize]) {
        for cell in cells {
            game.play(*cell).unwrap();
        }
    }

    #[test]
    fn win_is_credited_once_and_locks_the_board() {
        let mut game = LocalGame::default();
        play_all(&mut game, &[0, 4, 1, 7, 2]);

        assert_eq!(game.outcome(), Some(Outcome::WinnerX));
        assert_eq!(game.scores(), Scoreboard { x: 1, o: 0 });
        assert_eq!(game.status_line(), "Winner: Player X");

        let err = game.play(8).unwrap_err();
        assert!(matches!(err, RuleViolation::GameNotActive { .. }));
        assert_eq!(game.scores(), Scoreboard { x: 1, o: 0 });
    }

    #[test]
    fn new_game_keeps_scores_and_reset_clears_them() {
        let mut game = LocalGame::default();
        play_all(&mut game, &[0, 4, 1, 7, 2]);
        game.new_game();

        assert_eq!(game.board(), &Board::new());
        assert_eq!(game.current_turn(), Mark::X);
        assert_eq!(game.scores().x, 1);

        play_all(&mut game, &[0, 3, 1, 4, 8, 5]);
        assert_eq!(game.scores(), Scoreboard { x: 1, o: 1 });

        game.reset_scores();
        assert_eq!(game.scores(), Scoreboard::default());
    }

    #[test]
    fn draw_credits_nobody() {
        let mut game = LocalGame::default();
        play_all(&mut game, &[0, 1, 2, 4, 3, 5, 7, 6, 8]);
        assert_eq!(game.outcome(), Some(Outcome::Draw));
        assert_eq!(game.scores(), Scoreboard::default());
        assert_eq!(game.status_line(), "It's a draw!");
    }

    #[test]
    fn occupied_cell_is_rejected_without_changing_turn() {
        let mut game = LocalGame::default();
        game.play(4).unwrap();
        assert_eq!(
            game.play(4).unwrap_err(),
            RuleViolation::CellOccupied { cell: 4 }
        );
        assert_eq!(game.current_turn(), Mark::O);
    }

    #[test]
    fn two_player_names_fall_back_to_mark_labels() {
        let mut game = LocalGame::new(LocalMode::TwoPlayer {
            player_x: "Ada".into(),
            player_o: "  ".into(),
        });
        assert_eq!(game.status_line(), "Next player: Ada");
        game.play(0).unwrap();
        assert_eq!(game.status_line(), "Next player: Player O");
    }
}
