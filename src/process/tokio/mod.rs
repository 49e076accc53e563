pub mod runner;

pub(crate) mod context;
pub(crate) mod handler;
pub(crate) mod run_loop;
pub(crate) mod spawn;
pub(crate) mod start;

#[cfg(test)]
mod integration_tests;
