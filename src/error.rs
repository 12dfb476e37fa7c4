use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReducerError {
    #[error("Invalid reducer configuration: {0}")]
    Config(String),

    #[error("Checkpoint creation failed: {0}")]
    CheckpointFailed(#[source] Box<ReducerError>),

    #[error("Summarizer error: {0}")]
    Summarizer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type ReducerResult<T> = Result<T, ReducerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = ReducerError::Config("swap_threshold must exceed checkpoint_threshold".into());
        assert!(err.to_string().contains("swap_threshold"));

        let err = ReducerError::Summarizer("model unavailable".into());
        assert_eq!(err.to_string(), "Summarizer error: model unavailable");

        let err = ReducerError::CheckpointFailed(Box::new(ReducerError::Summarizer(
            "timed out".into(),
        )));
        assert!(err.to_string().contains("Checkpoint creation failed"));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn checkpoint_failed_exposes_source() {
        use std::error::Error as _;
        let err = ReducerError::CheckpointFailed(Box::new(ReducerError::Summarizer("boom".into())));
        let source = err.source().expect("source present");
        assert!(source.to_string().contains("boom"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReducerError>();
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: ReducerError = json_err.into();
        assert!(matches!(err, ReducerError::Serialization(_)));
    }
}
