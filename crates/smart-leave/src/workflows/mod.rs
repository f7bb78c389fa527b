pub mod export;
pub mod leave;
pub mod letter;
