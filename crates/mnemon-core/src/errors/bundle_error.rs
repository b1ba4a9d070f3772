/// Bundle codec errors.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("bundle integrity mismatch in `{file}`: {detail}")]
    IntegrityMismatch { file: String, detail: String },

    #[error("bundle signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    #[error("malformed bundle: {detail}")]
    Malformed { detail: String },
}
