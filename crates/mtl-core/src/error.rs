use crate::types::Location;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct TranslationError {
    pub code: String,
    pub message: String,
    pub location: Option<Location>,
}

impl TranslationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Attaches the source location the error points at.
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Formats the error as a single diagnostic line, `<path>:<line>: <message>`.
    pub fn diagnostic(&self) -> String {
        match &self.location {
            Some(location) => format!("{}: {}", location, self.message),
            None => self.message.clone(),
        }
    }
}
