mod query;
mod repository;
mod schema;

pub use repository::Repository;
