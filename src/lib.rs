pub mod capture;
pub mod driver;
pub mod parser;
pub mod report;
pub mod rules;
pub mod runner;
pub mod utils;

// Re-export common items
pub use parser::load_config;
pub use report::save_results;
pub use rules::compile_rules;
pub use runner::run_sequences;
