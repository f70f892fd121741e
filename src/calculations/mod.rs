pub mod cascade;
pub mod dates;
