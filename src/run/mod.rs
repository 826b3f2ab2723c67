pub mod core;
pub mod disp;
pub mod input;
pub mod instruct;
pub mod interp;
pub mod mem;
pub mod rom;
pub mod trace;
pub mod vm;
