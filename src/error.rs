use thiserror::Error;

/// Failure talking to one of the external services.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Underlying request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("no geocoding result for the address")]
    AddressNotFound,

    #[error("no buildings in the search area")]
    NoBuildingsFound,

    #[error("fetch failed: {0}")]
    FetchFailure(#[from] FetchError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl SearchError {
    /// Text for the single error region of the search form.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::AddressNotFound => {
                "Address not found. Please enter a valid address.".to_string()
            }
            SearchError::NoBuildingsFound => "No buildings found in this area.".to_string(),
            SearchError::FetchFailure(_) => {
                "An error occurred while fetching the data.".to_string()
            }
            SearchError::InvalidInput(reason) => reason.clone(),
        }
    }
}
