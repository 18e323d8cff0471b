#![cfg(all(test, unix))]
mod utils;
mod workflow;
