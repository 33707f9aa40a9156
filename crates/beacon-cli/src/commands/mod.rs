pub mod check;
pub mod matches;
