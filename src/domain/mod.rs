mod account;
mod algorithm;

pub use account::*;
pub use algorithm::*;
