use std::error::Error as StdError;

/// Boxed error used as the `source` of native and render failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the embedding runtime.
///
/// None of these are retried internally. A failing surface stops rendering and
/// reports the error through its loop handle; sibling surfaces are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The current target has no implementation for the requested operation.
    #[error("unsupported platform: {what}")]
    PlatformUnsupported { what: &'static str },

    /// A native window, context, or device call failed.
    #[error("{what}")]
    NativeApi {
        what: String,
        #[source]
        source: BoxError,
    },

    /// A context was made current (or used) in an invalid state, or from a
    /// thread that does not own it.
    #[error("context state: {what}")]
    ContextState {
        what: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The renderer failed while preparing (`frame == None`) or drawing a frame.
    #[error("{}", describe_frame(.frame))]
    RenderFrame {
        frame: Option<u64>,
        #[source]
        source: BoxError,
    },

    /// The render worker could not be started or terminated abnormally.
    #[error("render thread: {0}")]
    Thread(String),

    /// The embedded view was already closed.
    #[error("embedded view is closed")]
    Closed,
}

impl Error {
    pub(crate) fn native(what: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::NativeApi {
            what: what.into(),
            source: source.into(),
        }
    }

    pub(crate) fn context_state(what: impl Into<String>) -> Self {
        Error::ContextState {
            what: what.into(),
            source: None,
        }
    }

    pub(crate) fn context_failure(what: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::ContextState {
            what: what.into(),
            source: Some(source.into()),
        }
    }

    pub(crate) fn render(frame: Option<u64>, source: impl Into<BoxError>) -> Self {
        Error::RenderFrame {
            frame,
            source: source.into(),
        }
    }

    /// Returns `true` for errors that terminate the owning surface only.
    pub fn is_frame_error(&self) -> bool {
        matches!(self, Error::RenderFrame { .. })
    }
}

fn describe_frame(frame: &Option<u64>) -> String {
    match frame {
        Some(index) => format!("render failed at frame {index}"),
        None => "renderer preparation failed".to_string(),
    }
}
