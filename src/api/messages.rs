use serde::{Deserialize, Serialize};

use crate::session::Question;

/// Body returned by the transcription endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: String,
}

/// Sent after each answered question to ask for a follow-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub question_id: String,
    pub response: String,
    pub current_question_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpResponse {
    #[serde(default)]
    pub follow_up_question: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_question: Option<FollowQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowQuestion {
    pub id: String,
    pub question: String,
}

impl FollowUpResponse {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_question(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            follow_up_question: true,
            follow_question: Some(FollowQuestion {
                id: id.into(),
                question: question.into(),
            }),
        }
    }

    /// The follow-up to insert, if the server asked for one.
    /// A `true` flag without a question body is treated as no follow-up.
    pub fn into_question(self, parent_id: &str) -> Option<Question> {
        if !self.follow_up_question {
            return None;
        }
        self.follow_question
            .map(|fq| Question::follow_up(fq.id, fq.question, parent_id))
    }
}
