pub mod import;
pub mod student_service;

pub use student_service::{ConsentsInput, DocumentsInput, ExportBundle, MedicalInput, ServiceError, StudentService};
