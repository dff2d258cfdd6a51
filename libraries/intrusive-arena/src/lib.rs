#![no_std]

extern crate alloc;

mod arena;
mod list;

pub use arena::*;
pub use list::*;
