mod core;

pub use core::QueryParams;
