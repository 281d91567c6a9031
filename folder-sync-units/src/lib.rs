//! systemd unit generation for scheduled and change-triggered runs.

mod error;
pub mod paths;
pub mod systemd;

pub use error::UnitError;
pub use systemd::{
    generate_path_unit, generate_service_template, generate_timer, write_units, UnitOptions,
};
