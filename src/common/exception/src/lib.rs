mod error;

pub use error::{GeoQueryError, Result};
