pub(crate) mod helper;

mod basic;
mod interrupt;
mod stdin;
