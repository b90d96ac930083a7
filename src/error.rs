//! Error taxonomy for the dataset pipeline.
//!
//! Only [`PipelineError::DataUnavailable`] on a required static input is
//! fatal to a run; every other kind is handled at the component boundary
//! and degrades the output instead of aborting it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required input file (manifest, region source, airport source) is
    /// missing or unparseable. Voids all downstream results.
    #[error("required input unavailable: {message}")]
    DataUnavailable { message: String },

    /// Connection-level failure or reset during a fetch. Retryable.
    #[error("transient network failure for {iata}: {message}")]
    TransientNetwork { iata: String, message: String },

    /// The service returned a response of an unexpected shape. Not retryable.
    #[error("malformed response for {iata}: {message}")]
    MalformedResponse { iata: String, message: String },

    /// An airport with no entry in the airport-location table.
    #[error("no location entry for airport {iata}")]
    UnresolvableLocation { iata: String },
}

impl PipelineError {
    pub fn data_unavailable<S: Into<String>>(message: S) -> Self {
        Self::DataUnavailable {
            message: message.into(),
        }
    }

    pub fn transient<S: Into<String>>(iata: &str, message: S) -> Self {
        Self::TransientNetwork {
            iata: iata.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed<S: Into<String>>(iata: &str, message: S) -> Self {
        Self::MalformedResponse {
            iata: iata.to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` if the failure should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. })
    }
}
