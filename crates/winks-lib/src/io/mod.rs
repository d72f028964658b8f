pub mod cache;
pub mod text;
