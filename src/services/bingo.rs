/// Watch/read bingo
///
/// A 5x5 card numbered 1..=25 row by row. Square 13 is the free centre and
/// always counts as completed.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tokio::sync::RwLock;

use crate::{
    db::LocalStorage,
    error::{AppError, AppResult},
    models::MediaType,
};

pub const BOARD_SIZE: u8 = 5;
pub const FREE_SQUARE: u8 = 13;

const BOARD_KEY: &str = "bingo";

const SCREEN_PROMPTS: [&str; 24] = [
    "A film older than you",
    "A foreign-language title",
    "A documentary",
    "An animated feature",
    "A title with a one-word name",
    "A debut from a new director",
    "A sequel you skipped",
    "A cult classic",
    "Something set in space",
    "A musical",
    "A true story",
    "A critic's darling you avoided",
    "A comfort rewatch",
    "A title from the year you were born",
    "A Bollywood hit",
    "A silent or black-and-white film",
    "A horror you are scared of",
    "A miniseries",
    "A film over three hours",
    "An award winner",
    "A recommendation from a friend",
    "A heist story",
    "A coming-of-age story",
    "Something trending this week",
];

const BOOK_PROMPTS: [&str; 24] = [
    "A book older than you",
    "A translated novel",
    "A memoir",
    "A graphic novel",
    "A book with a one-word title",
    "A debut novel",
    "The second book in a series",
    "A cult classic",
    "Science fiction set in space",
    "A poetry collection",
    "Narrative nonfiction",
    "A prize winner",
    "A childhood favourite reread",
    "A book from the year you were born",
    "A book by an Indian author",
    "A classic you never finished",
    "A horror novel",
    "A short story collection",
    "A book over 500 pages",
    "A book with a cat on the cover",
    "A recommendation from a friend",
    "A mystery",
    "A coming-of-age story",
    "A book turned into a film",
];

/// A completed row, column or diagonal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Line {
    /// 1-based row index
    Row(u8),
    /// 1-based column index
    Column(u8),
    /// Top-left to bottom-right
    Diagonal,
    /// Top-right to bottom-left
    AntiDiagonal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Square {
    pub id: u8,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub media_type: MediaType,
    pub squares: Vec<Square>,
    pub completed: BTreeSet<u8>,
}

impl Board {
    pub fn new(media_type: MediaType) -> Self {
        let prompts: &[&str] = match media_type {
            MediaType::Book => &BOOK_PROMPTS,
            MediaType::Movie | MediaType::Tv => &SCREEN_PROMPTS,
        };

        let mut prompts = prompts.iter();
        let squares = (1..=BOARD_SIZE * BOARD_SIZE)
            .map(|id| Square {
                id,
                prompt: if id == FREE_SQUARE {
                    "Free".to_string()
                } else {
                    prompts.next().map(|p| p.to_string()).unwrap_or_default()
                },
            })
            .collect();

        Self {
            media_type,
            squares,
            completed: BTreeSet::new(),
        }
    }

    pub fn lines(&self) -> Vec<Line> {
        completed_lines(&self.completed)
    }
}

pub fn is_square_completed(id: u8, completed: &BTreeSet<u8>) -> bool {
    id == FREE_SQUARE || completed.contains(&id)
}

/// Flips a square, returning its new state; the free centre cannot be toggled
pub fn toggle_square(id: u8, completed: &mut BTreeSet<u8>) -> AppResult<bool> {
    if !(1..=BOARD_SIZE * BOARD_SIZE).contains(&id) {
        return Err(AppError::InvalidInput(format!(
            "Square must be between 1 and {}",
            BOARD_SIZE * BOARD_SIZE
        )));
    }
    if id == FREE_SQUARE {
        return Ok(true);
    }

    if !completed.remove(&id) {
        completed.insert(id);
    }
    Ok(completed.contains(&id))
}

pub fn completed_lines(completed: &BTreeSet<u8>) -> Vec<Line> {
    let n = BOARD_SIZE;
    let square = |row: u8, col: u8| row * n + col + 1;

    let mut lines = Vec::new();
    for row in 0..n {
        if line_done((0..n).map(|col| square(row, col)), completed) {
            lines.push(Line::Row(row + 1));
        }
    }
    for col in 0..n {
        if line_done((0..n).map(|row| square(row, col)), completed) {
            lines.push(Line::Column(col + 1));
        }
    }
    if line_done((0..n).map(|i| square(i, i)), completed) {
        lines.push(Line::Diagonal);
    }
    if line_done((0..n).map(|i| square(i, n - 1 - i)), completed) {
        lines.push(Line::AntiDiagonal);
    }
    lines
}

fn line_done(mut ids: impl Iterator<Item = u8>, completed: &BTreeSet<u8>) -> bool {
    ids.all(|id| is_square_completed(id, completed))
}

/// The single persisted card
pub struct BingoService {
    storage: LocalStorage,
    board: RwLock<Board>,
}

impl BingoService {
    pub fn load(storage: LocalStorage) -> Self {
        let board = match storage.load::<Board>(BOARD_KEY) {
            Ok(Some(board)) => board,
            Ok(None) => Board::new(MediaType::Movie),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable bingo board");
                Board::new(MediaType::Movie)
            }
        };

        Self {
            storage,
            board: RwLock::new(board),
        }
    }

    pub async fn board(&self) -> Board {
        self.board.read().await.clone()
    }

    pub async fn toggle(&self, id: u8) -> AppResult<Board> {
        let mut board = self.board.write().await;
        toggle_square(id, &mut board.completed)?;
        self.persist(&board);
        Ok(board.clone())
    }

    /// Starts a fresh card, keeping the current media type unless one is given
    pub async fn reset(&self, media_type: Option<MediaType>) -> Board {
        let mut board = self.board.write().await;
        let media_type = media_type.unwrap_or(board.media_type);
        *board = Board::new(media_type);
        self.persist(&board);
        board.clone()
    }

    fn persist(&self, board: &Board) {
        if let Err(e) = self.storage.save(BOARD_KEY, board) {
            tracing::error!(error = %e, "Failed to persist bingo board");
        }
    }
}
