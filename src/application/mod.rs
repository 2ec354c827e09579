pub mod use_cases;

pub use use_cases::context::StudentContext;
pub use use_cases::structured_output::ChainSettings;
