pub mod backup;
pub mod books;
pub mod borrow;
pub mod core;
pub mod settings;
pub mod students;
