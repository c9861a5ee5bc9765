pub mod apply;
pub mod plan;
pub mod validate;

mod common;
