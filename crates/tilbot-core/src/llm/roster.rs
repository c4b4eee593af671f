use crate::error::TilbotError;

/// Ordered candidate models with a rotating cursor. Only fallback moves the
/// cursor; it wraps past the last model back to the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoster {
    models: Vec<String>,
    cursor: usize,
}

impl ModelRoster {
    pub fn new<I, S>(models: I) -> Result<Self, TilbotError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<String> = models.into_iter().map(Into::into).collect();
        if models.is_empty() {
            return Err(TilbotError::config("model roster must not be empty"));
        }
        Ok(Self { models, cursor: 0 })
    }

    pub fn current(&self) -> &str {
        &self.models[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move to the next model, wrapping around, and return it.
    pub fn advance(&mut self) -> &str {
        self.cursor = (self.cursor + 1) % self.models.len();
        self.current()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
