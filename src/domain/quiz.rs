use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const ANSWERS_PER_QUESTION: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[validate(schema(function = "validate_answer_key"))]
pub struct MultipleChoiceQuizQuestion {
    pub question: String,
    /// The possible answers to the question
    #[validate(length(equal = 4, message = "there must be exactly 4 answers"))]
    pub answers: Vec<String>,
    /// The index of the correct answer in the answers list
    pub answer_key: i64,
}

fn validate_answer_key(question: &MultipleChoiceQuizQuestion) -> Result<(), ValidationError> {
    if question.answer_key < 0 || question.answer_key as usize >= question.answers.len() {
        let mut err = ValidationError::new("answer_key");
        err.message = Some("answer_key must be a valid index in answers".into());
        return Err(err);
    }
    Ok(())
}

impl MultipleChoiceQuizQuestion {
    pub fn str_fmt(&self) -> String {
        let answers = self
            .answers
            .iter()
            .enumerate()
            .map(|(i, answer)| {
                if i as i64 == self.answer_key {
                    format!("*{}*", answer)
                } else {
                    answer.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n  - ");
        format!("## {}\n  - {}", self.question, answers)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[validate(schema(function = "validate_question_count"))]
pub struct MultipleChoiceQuiz {
    /// The school subject the quiz is for
    pub subject: String,
    /// The multiple choice quiz questions
    #[validate(nested)]
    pub questions: Vec<MultipleChoiceQuizQuestion>,
    /// The number of questions in the quiz
    pub num_questions: i64,
}

fn validate_question_count(quiz: &MultipleChoiceQuiz) -> Result<(), ValidationError> {
    if quiz.questions.len() as i64 != quiz.num_questions {
        let mut err = ValidationError::new("num_questions");
        err.message = Some("the number of questions must match num_questions".into());
        return Err(err);
    }
    Ok(())
}

impl MultipleChoiceQuiz {
    pub fn str_fmt(&self) -> String {
        let questions = self
            .questions
            .iter()
            .map(|q| q.str_fmt())
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("# {}\n\n{}", self.subject, questions)
    }
}
