//! Request handlers

mod cows;
mod health;

pub use cows::*;
pub use health::*;
