pub mod curriculum;
pub mod error;
pub mod learn_artifact;
pub mod learn_log;
pub mod llm_config;
pub mod nomy;
pub mod quiz;
pub mod sofatutor;
pub mod week;
