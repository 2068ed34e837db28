//! Interview questions and their sequencing

use serde::{Deserialize, Serialize};

/// Used whenever the question generation service cannot be reached
pub const DEFAULT_QUESTIONS: [&str; 5] = [
    "Tell me about yourself and your experience.",
    "What are your greatest strengths?",
    "Why do you want to work for this company?",
    "Where do you see yourself in five years?",
    "What is your greatest professional achievement?",
];

/// A single interview question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Position in interview order (0-based)
    pub index: usize,

    pub text: String,
}

impl Question {
    /// Number a list of question texts in order
    pub fn numbered<I, S>(texts: I) -> Vec<Question>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Question {
                index,
                text: text.into(),
            })
            .collect()
    }
}

pub fn default_questions() -> Vec<Question> {
    Question::numbered(DEFAULT_QUESTIONS)
}

/// Ordered question list plus a cursor. No I/O.
#[derive(Debug, Default)]
pub struct QuestionSequencer {
    questions: Vec<Question>,
    current: Option<usize>,
}

impl QuestionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the question list and point at the first question.
    ///
    /// Questions are renumbered by position, whatever indices they came with.
    pub fn load(&mut self, questions: Vec<Question>) {
        self.current = if questions.is_empty() { None } else { Some(0) };
        self.questions = Question::numbered(questions.into_iter().map(|q| q.text));
    }

    pub fn current(&self) -> Option<&Question> {
        self.current.and_then(|i| self.questions.get(i))
    }

    pub fn index(&self) -> Option<usize> {
        self.current
    }

    /// Move to the next question. Returns false, without moving, when
    /// already at the last question.
    pub fn advance(&mut self) -> bool {
        match self.current {
            Some(i) if i + 1 < self.questions.len() => {
                self.current = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    pub fn is_last(&self) -> bool {
        matches!(self.current, Some(i) if i + 1 == self.questions.len())
    }

    /// Clear the cursor once the last question has been acknowledged
    pub fn finish(&mut self) {
        self.current = None;
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_none_before_load() {
        let sequencer = QuestionSequencer::new();
        assert!(sequencer.current().is_none());
        assert!(!sequencer.is_last());
    }

    #[test]
    fn test_advance_stops_at_last_question() {
        let mut sequencer = QuestionSequencer::new();
        sequencer.load(Question::numbered(["a", "b", "c"]));

        assert_eq!(sequencer.current().unwrap().text, "a");
        assert!(sequencer.advance());
        assert!(sequencer.advance());
        assert!(sequencer.is_last());
        assert!(!sequencer.advance());
        assert_eq!(sequencer.index(), Some(2));

        sequencer.finish();
        assert!(sequencer.current().is_none());
    }

    #[test]
    fn test_load_renumbers_by_position() {
        let mut sequencer = QuestionSequencer::new();
        sequencer.load(vec![
            Question { index: 5, text: "first".to_string() },
            Question { index: 9, text: "second".to_string() },
        ]);

        let current = sequencer.current().unwrap();
        assert_eq!((current.index, sequencer.index()), (0, Some(0)));
        assert!(sequencer.advance());
        let current = sequencer.current().unwrap();
        assert_eq!((current.index, current.text.as_str()), (1, "second"));
        assert_eq!(sequencer.index(), Some(1));
    }

    #[test]
    fn test_single_question_is_last_immediately() {
        let mut sequencer = QuestionSequencer::new();
        sequencer.load(Question::numbered(["only"]));
        assert!(sequencer.is_last());
    }

    #[test]
    fn test_default_questions_are_numbered() {
        let questions = default_questions();
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[4].index, 4);
        assert_eq!(questions[0].text, DEFAULT_QUESTIONS[0]);
    }
}
