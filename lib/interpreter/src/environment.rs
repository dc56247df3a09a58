use std::collections::HashMap;

use scanner::Token;
use value::Value;

use crate::{RuntimeError, RuntimeErrorType};

/// Index of a frame in the [`Environment`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub struct FrameId(usize);

impl FrameId {
    pub const GLOBAL: FrameId = FrameId(0);
}

#[derive(Debug, Default)]
struct Frame {
    values: HashMap<String, Value>,
    enclosing: Option<FrameId>,
}

/// All scopes that are currently alive, innermost last.
///
/// Frames link to their enclosing frame by index; lookups walk that chain
/// outwards until they reach the global frame.
#[derive(Debug)]
pub struct Environment {
    frames: Vec<Frame>,
    current: FrameId,
}

impl Default for Environment {
    fn default() -> Self {
        Self { frames: vec![Frame::default()], current: FrameId::GLOBAL }
    }
}

impl Environment {
    pub fn current(&self) -> FrameId {
        self.current
    }

    /// Number of frames alive, the global one included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Enters a new frame enclosed by the current one. Returns the frame
    /// that has to be passed to [`Environment::restore`] when leaving it.
    pub fn push_frame(&mut self) -> FrameId {
        let previous = self.current;
        self.frames.push(Frame { values: HashMap::new(), enclosing: Some(previous) });
        self.current = FrameId(self.frames.len() - 1);
        log::trace!("Entered frame {} (enclosing {})", self.current, previous);
        previous
    }

    /// Makes `frame` the current one again, dropping every frame entered after it.
    pub fn restore(&mut self, frame: FrameId) {
        log::trace!("Restoring frame {} (leaving {})", frame, self.current);
        self.frames.truncate(frame.0 + 1);
        self.current = frame;
    }

    /// Binds `name` in the current frame only, replacing any earlier binding there.
    pub fn define(&mut self, name: &str, value: Value) {
        self.frames[self.current.0].values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<&Value, RuntimeError> {
        self.chain()
            .find_map(|id| self.frames[id.0].values.get(name.lexeme()))
            .ok_or_else(|| undefined(name))
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let frame = self
            .chain()
            .find(|id| self.frames[id.0].values.contains_key(name.lexeme()))
            .ok_or_else(|| undefined(name))?;

        self.frames[frame.0].values.insert(name.lexeme().to_string(), value);
        Ok(())
    }

    fn chain(&self) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(Some(self.current), |id| self.frames[id.0].enclosing)
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(RuntimeErrorType::UndefinedVariable(name.lexeme().to_string()), name)
}
