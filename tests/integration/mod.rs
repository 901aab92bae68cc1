//! End-to-end patching of script functions through the public API.

mod cache;
mod common;
mod patch;
mod paths;
mod replace;
mod replace_substring;
mod temp_patch;
mod unpatch;
