pub mod catalog;
pub mod identity;
