pub mod config;
pub mod llm_clients;
pub mod pdf;
pub mod response;
pub mod sofatutor;
pub mod storage;
