pub mod import;
pub mod token;
