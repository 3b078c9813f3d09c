pub mod brew;
pub mod cache;
pub mod recipe;
