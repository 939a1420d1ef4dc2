// Library interface for vibedigest modules
// This allows tests and other binaries to import modules

pub mod acquisition;
pub mod digest;
pub mod error;
pub mod llm;
pub mod scraping;
pub mod server;
pub mod types;
