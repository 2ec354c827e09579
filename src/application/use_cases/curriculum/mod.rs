pub mod learning_examples;
pub mod parser;
pub mod prompts;
pub mod summarizer;

pub use learning_examples::{LearningExampleGenerator, DEFAULT_NUM_EXAMPLES};
pub use parser::CurriculumParser;
pub use summarizer::{CurriculumSummarizer, SummarizeOptions};
