pub mod ini;
pub mod trigger;

pub use ini::{parse_ini, IniProperty, IniSection};
pub use trigger::parse_trigger;
