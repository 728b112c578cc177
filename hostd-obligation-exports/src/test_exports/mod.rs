// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Test utilities: mockable collaborators and obligation generators.

mod mock;
mod tools;

pub use mock::*;
pub use tools::*;
