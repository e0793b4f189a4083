mod settings;

pub use settings::{RecorderConfig, TomlConfig, EXAMPLE_CONFIG};
