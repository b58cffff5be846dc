pub mod bands;
pub mod filter;
pub mod grouping;
pub mod sort;
pub mod summary;
