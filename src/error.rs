use thiserror::Error;

/// Failure talking to the CRM, classified by what the caller should do next.
#[derive(Debug, Error)]
pub enum CrmError {
    /// 400-499: the token or credentials were not accepted.
    #[error("CRM rejected the request (HTTP {0})")]
    Rejected(u16),
    #[error("CRM returned HTTP {0}")]
    Server(u16),
    #[error("network error contacting CRM: {0}")]
    Transport(String),
    #[error("unexpected CRM response: {0}")]
    Decode(String),
}

/// Lookup outcomes the user sees. "No match" is a success, not listed here.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("'{0}' does not contain a phone number.")]
    InvalidNumber(String),
    #[error("Please log in to the CRM to look up contacts.")]
    MissingCredentials,
    #[error("The CRM did not accept your login (HTTP {0}). Please log in again.")]
    AuthRejected(u16),
    #[error("The CRM could not complete the lookup. Please try again later.")]
    CrmServer(String),
    #[error("local history file error: {0}")]
    LocalIo(String),
}

impl From<CrmError> for LookupError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Rejected(code) => LookupError::AuthRejected(code),
            other => LookupError::CrmServer(other.to_string()),
        }
    }
}
