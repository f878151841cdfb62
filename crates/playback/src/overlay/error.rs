use thiserror::Error;

/// Why the annotation canvas could not be (re)initialized.
///
/// Both variants mean annotation is simply not available right now; callers log
/// them and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanvasError {
    #[error("the overlay has no canvas element")]
    NoSurface,

    #[error("no drawable context for a {width}x{height} px surface")]
    NoContext { width: u32, height: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FullscreenError {
    #[error("{0} does not support fullscreen")]
    Unsupported(&'static str),

    #[error("{backend} rejected the request: {reason}")]
    Rejected {
        backend: &'static str,
        reason: String,
    },

    #[error("no fullscreen backend is available")]
    NoBackend,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color '{0}': expected #rrggbb or #rgb")]
pub struct ColorError(pub String);
