//! Command line entry points, one module per subcommand.

pub mod fix_duration;
pub mod inspect;
pub mod mux;
