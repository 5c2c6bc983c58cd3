pub mod capture;
pub mod catalog;
pub mod geo;
pub mod integration;
pub mod location;
pub mod playback;
pub mod proximity;
pub mod store;
pub mod submission;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SoundtrailError {
    #[error("Permission denied: {0}")]
    PermissionError(String),

    #[error("Position unavailable: {0}")]
    PositionError(String),

    #[error("Timed out: {0}")]
    TimeoutError(String),

    #[error("Audio device unavailable: {0}")]
    AudioDeviceError(String),

    #[error("Playback error: {0}")]
    PlaybackError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Insert error: {0}")]
    InsertError(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid state: {0}")]
    StateError(String),

    #[error("Not in range: {0}")]
    RangeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for SoundtrailError {
    fn from(e: std::io::Error) -> Self {
        SoundtrailError::IOError(e.to_string())
    }
}

impl SoundtrailError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Needs the user to change device settings
            SoundtrailError::PermissionError(_) => false,
            // Sensor and network failures are typically transient
            SoundtrailError::PositionError(_) => true,
            SoundtrailError::TimeoutError(_) => true,
            SoundtrailError::PlaybackError(_) => true,
            SoundtrailError::UploadError(_) => true,
            SoundtrailError::InsertError(_) => true,
            SoundtrailError::CatalogError(_) => true,
            // Walking closer fixes it
            SoundtrailError::RangeError(_) => true,
            SoundtrailError::AudioDeviceError(_) => false,
            SoundtrailError::ValidationError(_) => false,
            SoundtrailError::StateError(_) => false,
            SoundtrailError::ConfigError(_) => false,
            SoundtrailError::IOError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            SoundtrailError::PermissionError(_) => {
                "Access was denied. Open your device or browser settings, allow location \
                 and microphone access for this app, then try again."
                    .to_string()
            }
            SoundtrailError::PositionError(_) => {
                "Your position could not be determined. Please try again.".to_string()
            }
            SoundtrailError::TimeoutError(_) => {
                "Finding your position took too long. Please try again.".to_string()
            }
            SoundtrailError::AudioDeviceError(_) => {
                "No microphone available. Please check that one is connected and that \
                 microphone access is allowed in your device settings."
                    .to_string()
            }
            SoundtrailError::PlaybackError(_) => "Could not play the recording.".to_string(),
            SoundtrailError::UploadError(_) => {
                "Uploading the recording failed. Please try again.".to_string()
            }
            SoundtrailError::InsertError(_) => {
                "Saving the recording failed. Please try again.".to_string()
            }
            SoundtrailError::CatalogError(_) => {
                "Could not load recordings. Please try again.".to_string()
            }
            SoundtrailError::ValidationError(msg) => format!("Please check your input: {}", msg),
            SoundtrailError::StateError(_) => {
                "That action is not available right now.".to_string()
            }
            SoundtrailError::RangeError(_) => "Move closer to listen.".to_string(),
            SoundtrailError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            SoundtrailError::IOError(_) => "File system error occurred.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SoundtrailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_message_explains_settings() {
        let msg = SoundtrailError::PermissionError("location".into()).user_message();
        assert!(msg.contains("settings"));
        assert!(!SoundtrailError::PermissionError("x".into()).is_recoverable());
    }

    #[test]
    fn test_submission_errors_are_recoverable() {
        assert!(SoundtrailError::UploadError("503".into()).is_recoverable());
        assert!(SoundtrailError::InsertError("409".into()).is_recoverable());
        assert!(!SoundtrailError::ValidationError("title".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: SoundtrailError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(matches!(err, SoundtrailError::IOError(_)));
    }
}
