pub mod deploy;
pub mod stack;
pub mod testing;
