/// Policy and guard violations. Never auto-recovered.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("command `{command}` is not allowed by policy")]
    CommandBlocked { command: String, hint: String },

    #[error("path `{path}` is outside the allowed paths")]
    PathDenied { path: String, hint: String },

    #[error("network egress to `{target}` blocked by policy")]
    EgressBlocked { target: String },
}
