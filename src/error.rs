use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("playback blocked: {0}")]
    Blocked(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("network error: {0}")]
    Network(String),
    #[error("relay rejected submission: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(StorageError::Io("x".into()).to_string().starts_with("I/O error:"));
        assert_eq!(
            StorageError::Parse {
                line: 3,
                message: "bad".into()
            }
            .to_string(),
            "parse error at line 3: bad"
        );
        assert!(AudioError::Blocked("x".into()).to_string().contains("blocked"));
        assert!(ContactError::Network("x".into()).to_string().starts_with("network error"));
    }
}
