use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One interview question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    /// Prompt text
    pub question: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_follow_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            is_completed: false,
            is_follow_up: false,
            parent_id: None,
        }
    }

    pub fn follow_up(
        id: impl Into<String>,
        question: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            is_follow_up: true,
            parent_id: Some(parent_id.into()),
            ..Self::new(id, question)
        }
    }
}

/// Ordered questions of a session. Questions are only ever inserted or
/// marked complete, never removed.
#[derive(Debug, Clone, Default)]
pub struct QuestionList {
    items: Vec<Question>,
}

impl QuestionList {
    pub fn new(items: Vec<Question>) -> Self {
        Self { items }
    }

    /// Read a JSON array of questions
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read questions from {}", path.display()))?;
        let items: Vec<Question> =
            serde_json::from_str(&raw).context("Questions file is not a JSON array of questions")?;
        Ok(Self::new(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.items.get(index)
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.items.len()
    }

    pub fn mark_completed(&mut self, index: usize) {
        if let Some(q) = self.items.get_mut(index) {
            q.is_completed = true;
        }
    }

    /// Insert a follow-up directly after `after`; returns its index
    pub fn insert_follow_up(&mut self, after: usize, question: Question) -> usize {
        let at = (after + 1).min(self.items.len());
        self.items.insert(at, question);
        at
    }

    pub fn as_slice(&self) -> &[Question] {
        &self.items
    }
}
