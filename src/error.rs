use std::path::PathBuf;

/// Non-fatal conditions the engine degrades around.
///
/// Analysis operations never return these as `Err`; the rendered message is
/// attached to the neutral result instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("insufficient data for {context}: need at least {required} samples, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },

    #[error("no trained model for symptom '{symptom}'")]
    UnknownSymptom { symptom: String },

    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
