//! Cursors over pattern matches

use super::{Model, ModelError, ModelHandle, ModelResult};
use crate::rdf::Statement;
use crate::storage::Position;

/// Cursor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Positioned on a match
    Active,
    /// Advanced past the last match
    Exhausted,
    /// Released by its owner
    Closed,
}

/// Lazy, single-pass cursor over the statements matching a pattern
///
/// A cursor holds only a weak handle to its model and a resume position.
/// Each step takes the model's read lock briefly and asks the storage for
/// the next match after the current position, so the cursor sees a live
/// view: statements removed ahead of it are skipped, statements inserted
/// ahead of it may or may not be visited, and no statement is visited
/// twice. Using a cursor after its model was dropped fails with
/// [`ModelError::DanglingReference`].
#[derive(Debug)]
pub struct Cursor {
    model: ModelHandle,
    pattern: Statement,
    position: Position,
    current: Option<Statement>,
    state: CursorState,
}

impl Cursor {
    pub(crate) fn open(model: &Model, pattern: Statement) -> Self {
        let mut cursor = Self {
            model: model.handle(),
            pattern,
            position: Position::Start,
            current: None,
            state: CursorState::Active,
        };
        cursor.step(model);
        cursor
    }

    fn step(&mut self, model: &Model) -> bool {
        match model.next_match(&self.pattern, self.position) {
            Some((mut statement, position)) => {
                statement.bind(self.model.clone());
                self.current = Some(statement);
                self.position = position;
                true
            }
            None => {
                self.current = None;
                self.state = CursorState::Exhausted;
                false
            }
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Whether the cursor has no current statement
    pub fn is_exhausted(&self) -> bool {
        self.state != CursorState::Active
    }

    /// The statement the cursor is positioned on
    pub fn current(&self) -> ModelResult<&Statement> {
        match (&self.state, &self.current) {
            (CursorState::Active, Some(statement)) => Ok(statement),
            _ => Err(ModelError::CursorExhausted),
        }
    }

    /// Move to the next match; `false` once there is none
    pub fn advance(&mut self) -> ModelResult<bool> {
        if self.state != CursorState::Active {
            return Ok(false);
        }
        let model = self.model.upgrade().ok_or(ModelError::DanglingReference)?;
        Ok(self.step(&model))
    }

    /// Release the cursor; closing twice is a no-op
    pub fn close(&mut self) {
        if self.state == CursorState::Active {
            self.current = None;
            self.state = CursorState::Closed;
        }
    }
}

impl Iterator for Cursor {
    type Item = Statement;

    /// Yield the current statement and move past it
    ///
    /// Iteration ends early, without error, if the model is dropped.
    fn next(&mut self) -> Option<Statement> {
        if self.state != CursorState::Active {
            return None;
        }
        let statement = self.current.take()?;
        if self.advance().is_err() {
            self.close();
        }
        Some(statement)
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.close();
    }
}
