pub mod compute;
pub mod filter;
pub mod mappings;
pub mod summary;
