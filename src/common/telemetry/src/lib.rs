mod logging;

pub use logging::{init_logging, init_test_logging, log_level_from_env};
