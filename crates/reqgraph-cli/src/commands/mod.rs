pub mod element;
pub mod import;
pub mod projects;
pub mod query;
pub mod schema;
pub mod validate;
