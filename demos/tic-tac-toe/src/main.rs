use duelforge::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Empty,
    X,
    O,
}

impl Mark {
    fn as_char(self) -> char {
        match self {
            Mark::Empty => '.',
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    cells: [[Mark; 3]; 3],
    next: Mark, // X for the first role, O for the second
}

/// A move, and also a query target: a cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

/// "Which cells in this row are free?"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowQuery {
    pub row: usize,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct TicTacToe;

impl RulesEngine for TicTacToe {
    type State = Board;
    type Action = Cell;
    type Query = RowQuery;
    type Target = Cell;

    fn initial_state(&self) -> Board {
        Board {
            cells: [[Mark::Empty; 3]; 3],
            next: Mark::X,
        }
    }

    fn apply(&self, board: &Board, mv: &Cell) -> Result<Verdict<Board>, RulesError> {
        if mv.row >= 3 || mv.col >= 3 {
            return Ok(Verdict::reject("row and col must be 0-2"));
        }
        if board.cells[mv.row][mv.col] != Mark::Empty {
            return Ok(Verdict::reject("cell is occupied"));
        }

        let mark = board.next;
        let mut next = board.clone();
        next.cells[mv.row][mv.col] = mark;
        next.next = if mark == Mark::X { Mark::O } else { Mark::X };

        if check_winner(&next.cells, mark) {
            let summary = format!("{} wins!", mark.as_char());
            Ok(Verdict::finish(next, summary))
        } else if board_full(&next.cells) {
            Ok(Verdict::finish(next, "draw"))
        } else {
            Ok(Verdict::accept(next))
        }
    }

    fn legal_targets(&self, board: &Board, query: &RowQuery) -> Vec<Cell> {
        let Some(row) = board.cells.get(query.row) else {
            return Vec::new();
        };
        row.iter()
            .enumerate()
            .filter(|(_, m)| **m == Mark::Empty)
            .map(|(col, _)| Cell { row: query.row, col })
            .collect()
    }

    /// Rows top to bottom, `/`-separated: `"X.O/.X./..O"`.
    fn encode_state(&self, board: &Board) -> String {
        board
            .cells
            .iter()
            .map(|row| row.iter().map(|m| m.as_char()).collect::<String>())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn check_winner(b: &[[Mark; 3]; 3], m: Mark) -> bool {
    (0..3).any(|i| (0..3).all(|j| b[i][j] == m))           // rows
    || (0..3).any(|j| (0..3).all(|i| b[i][j] == m))        // cols
    || (0..3).all(|i| b[i][i] == m)                         // diagonal
    || (0..3).all(|i| b[i][2 - i] == m)                     // anti-diagonal
}

fn board_full(b: &[[Mark; 3]; 3]) -> bool {
    b.iter().all(|row| row.iter().all(|c| *c != Mark::Empty))
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".into());
    let addr = format!("0.0.0.0:{port}");

    let server = DuelforgeServerBuilder::new()
        .bind(&addr)
        .build(TicTacToe)
        .await?;

    server.run().await?;
    Ok(())
}
