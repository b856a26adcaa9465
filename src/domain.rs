use std::fmt;
use std::io::Error;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum RxError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    Logging(String),
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RxError::IoError(e) => write!(f, "io error: {e}"),
            RxError::PolarsError(e) => write!(f, "failed reading data: {e}"),
            RxError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            RxError::FileNotFound => write!(f, "file not found"),
            RxError::PermissionDenied => write!(f, "permission denied"),
            RxError::UnknownFileType => write!(f, "unknown file type, expected json, csv or parquet"),
            RxError::Logging(msg) => write!(f, "could not set up logging: {msg}"),
        }
    }
}

impl std::error::Error for RxError {}

impl From<Error> for RxError {
    fn from(err: Error) -> Self {
        RxError::IoError(err)
    }
}

impl From<PolarsError> for RxError {
    fn from(err: PolarsError) -> Self {
        RxError::PolarsError(err)
    }
}

/// Runtime settings shared by the model, controller and ui.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    ToggleSort,
    ShowMore,
    NextCategory,
    PrevCategory,
    Enter,
    Exit,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
q          quit
↑ ↓ ← →    move (also k j h l)
PgUp PgDn  page up / down
g G        first / last loaded row
/          search (live, Enter keeps, Esc reverts)
s          sort by selected column (again to flip)
m          show more rows
c C        next / previous category
Enter      show record
Esc        back
y Y        copy cell / row
?          this help";
