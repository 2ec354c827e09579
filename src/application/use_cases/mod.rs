pub mod batch;
pub mod context;
pub mod curriculum;
pub mod nomy_reports;
pub mod prompt_engine;
pub mod quiz_generator;
pub mod sofatutor_import;
pub mod structured_output;
pub mod week_summarizer;

#[cfg(test)]
pub mod test_support;
