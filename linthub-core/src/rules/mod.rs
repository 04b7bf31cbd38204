//! Rule configuration handling: the structured/XML mapper and the
//! service that manages the stored active configuration.

pub mod service;
pub mod xml;

pub use service::{DEFAULT_CONFIG_NAME, RulesService};
pub use xml::{parse_config, render_config};
