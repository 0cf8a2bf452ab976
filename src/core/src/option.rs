use common_exception::{GeoQueryError, Result};

use crate::index::NODE_CAPACITY;

/// Default minimum batch size before queries are fanned out to worker threads.
const DEFAULT_PARALLEL_THRESHOLD: usize = 256;

const ENV_PREFIX: &str = "GEOQUERY_";

/// Configuration options for a query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoQueryOptions {
    /// Initial candidate window of the nearest-neighbor search. The window
    /// doubles until the nearest target is proven.
    pub nearest_window: usize,

    /// Fan batch queries out to a worker pool.
    pub parallel: bool,

    /// Minimum number of queries in a batch before it is run in parallel.
    pub parallel_threshold: usize,

    /// Size of a dedicated worker pool. Zero shares the global rayon pool.
    pub num_threads: usize,
}

impl Default for GeoQueryOptions {
    fn default() -> Self {
        Self {
            nearest_window: NODE_CAPACITY,
            parallel: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            num_threads: 0,
        }
    }
}

/// A single configuration value, as listed by [`GeoQueryOptions::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub description: &'static str,
}

impl GeoQueryOptions {
    const KEYS: [(&'static str, &'static str); 4] = [
        (
            "nearest_window",
            "Initial candidate window of the nearest-neighbor search",
        ),
        ("parallel", "Fan batch queries out to a worker pool"),
        (
            "parallel_threshold",
            "Minimum number of queries in a batch before it is run in parallel",
        ),
        (
            "num_threads",
            "Size of a dedicated worker pool, 0 shares the global pool",
        ),
    ];

    pub fn with_nearest_window(self, nearest_window: usize) -> Self {
        Self {
            nearest_window,
            ..self
        }
    }

    pub fn with_parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }

    pub fn with_parallel_threshold(self, parallel_threshold: usize) -> Self {
        Self {
            parallel_threshold,
            ..self
        }
    }

    pub fn with_num_threads(self, num_threads: usize) -> Self {
        Self {
            num_threads,
            ..self
        }
    }

    /// Set an option from its string representation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "nearest_window" => {
                let window = parse_usize(key, value)?;
                if window == 0 {
                    return Err(GeoQueryError::Configuration(
                        "nearest_window must be at least 1".to_owned(),
                    ));
                }
                self.nearest_window = window;
            }
            "parallel" => self.parallel = parse_bool(key, value)?,
            "parallel_threshold" => self.parallel_threshold = parse_usize(key, value)?,
            "num_threads" => self.num_threads = parse_usize(key, value)?,
            _ => {
                return Err(GeoQueryError::Configuration(format!(
                    "Unknown option: {key}. Expected: nearest_window, parallel, parallel_threshold, num_threads"
                )));
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<ConfigEntry> {
        Self::KEYS
            .iter()
            .map(|(key, description)| {
                let value = match *key {
                    "nearest_window" => self.nearest_window.to_string(),
                    "parallel" => self.parallel.to_string(),
                    "parallel_threshold" => self.parallel_threshold.to_string(),
                    _ => self.num_threads.to_string(),
                };
                ConfigEntry {
                    key: (*key).to_owned(),
                    value,
                    description,
                }
            })
            .collect()
    }

    /// Defaults overridden by `GEOQUERY_<KEY>` environment variables, e.g.
    /// `GEOQUERY_NEAREST_WINDOW=32`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = Self::default();
        for (key, _) in Self::KEYS {
            let name = format!("{ENV_PREFIX}{}", key.to_uppercase());
            if let Some(value) = lookup(&name) {
                options.set(key, &value)?;
            }
        }
        Ok(options)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.nearest_window == 0 {
            return Err(GeoQueryError::Configuration(
                "nearest_window must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|_| {
        GeoQueryError::Configuration(format!(
            "Invalid value for {key}: {value}, expected a non-negative integer"
        ))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => {
            Err(GeoQueryError::Configuration(format!(
                "Invalid value for {key}: {value}, expected true or false"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let options = GeoQueryOptions::default();
        assert_eq!(options.nearest_window, 10);
        assert!(options.parallel);
        assert_eq!(options.parallel_threshold, 256);
        assert_eq!(options.num_threads, 0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_set() {
        let mut options = GeoQueryOptions::default();
        options.set("nearest_window", "32").unwrap();
        options.set("parallel", "OFF").unwrap();
        options.set("num_threads", " 4 ").unwrap();
        assert_eq!(
            options,
            GeoQueryOptions::default()
                .with_nearest_window(32)
                .with_parallel(false)
                .with_num_threads(4)
        );

        assert!(matches!(
            options.set("nearest_window", "0"),
            Err(GeoQueryError::Configuration(_))
        ));
        assert!(matches!(
            options.set("parallel", "maybe"),
            Err(GeoQueryError::Configuration(_))
        ));
        assert!(matches!(
            options.set("window", "3"),
            Err(GeoQueryError::Configuration(_))
        ));
    }

    #[test]
    fn test_entries() {
        let options = GeoQueryOptions::default().with_parallel_threshold(8);
        let entries = options.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[2].key, "parallel_threshold");
        assert_eq!(entries[2].value, "8");
    }

    #[test]
    fn test_from_vars() {
        let vars = HashMap::from([
            ("GEOQUERY_NEAREST_WINDOW".to_owned(), "64".to_owned()),
            ("GEOQUERY_PARALLEL".to_owned(), "false".to_owned()),
        ]);
        let options = GeoQueryOptions::from_vars(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(options.nearest_window, 64);
        assert!(!options.parallel);
        assert_eq!(options.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);

        let vars = HashMap::from([("GEOQUERY_NUM_THREADS".to_owned(), "-1".to_owned())]);
        assert!(GeoQueryOptions::from_vars(|name| vars.get(name).cloned()).is_err());
    }
}
