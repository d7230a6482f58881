pub mod test;
pub mod test_attempt;
pub mod test_result;
pub mod violation;
