pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStudentStore;
pub use postgres::PgStudentStore;
pub use store::{StoreError, StudentStore};
