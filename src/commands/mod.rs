pub mod quiz;

pub use quiz::{dispatch, parse_action, Flow};
