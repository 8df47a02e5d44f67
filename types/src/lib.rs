pub mod config;
pub mod consts;
pub mod containers;
pub mod nonstandard;
pub mod primitives;

mod container_impls;
