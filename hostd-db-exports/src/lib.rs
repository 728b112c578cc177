// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Boundary of the durable transactional store: controller trait, batch
//! type, key layout constants, configuration and errors.

mod constants;
mod controller;
mod db_batch;
mod error;
mod settings;

pub use constants::*;
pub use controller::*;
pub use db_batch::*;
pub use error::*;
pub use settings::*;
