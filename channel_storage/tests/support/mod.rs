#![allow(dead_code)]
pub mod contract;
pub mod datasets;
pub mod prepare_env;
pub mod spies;
