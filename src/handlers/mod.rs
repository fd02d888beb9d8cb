// Protected handlers: every route here sits behind the JWT middleware
// and reads the caller from the `AuthUser` request extension.
pub mod export;
pub mod import;
pub mod records;
pub mod students;
