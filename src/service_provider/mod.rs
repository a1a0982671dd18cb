pub mod paste;
pub mod slack;
