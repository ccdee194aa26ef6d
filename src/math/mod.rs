pub mod tensor;
pub mod conv;
