pub mod env;
pub mod retry;
