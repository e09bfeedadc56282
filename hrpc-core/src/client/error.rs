use crate::{
    binding::{BindError, DescriptorError},
    cluster::RouteError,
    decode::DecodeError,
    declaration::MethodId,
    http::ExecuteError,
};
use std::fmt;

/// Coarse classification of a failed call, for retry decisions at a higher layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The request could not be built. Retrying will not help.
    Request,
    /// The transport failed or the remote answered with a non-2xx status.
    Remote,
    /// The response could not be decoded into the declared type.
    Decode,
}

/// Errors that can occur during a single call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("The method is not registered")]
    UnknownMethod,
    #[error("Failed to build the method descriptor: '{0}'")]
    Descriptor(#[from] DescriptorError),
    #[error("Failed to resolve the host: '{0}'")]
    Route(#[from] RouteError),
    #[error("Failed to bind the arguments: '{0}'")]
    Bind(#[from] BindError),
    #[error("Request execution failed: '{0}'")]
    Execute(#[from] ExecuteError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("Failed to convert the reply into the requested type: '{0}'")]
    Convert(#[source] serde_json::Error),
}

impl CallError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CallError::UnknownMethod
            | CallError::Descriptor(_)
            | CallError::Route(_)
            | CallError::Bind(_) => ErrorCategory::Request,
            CallError::Execute(_) | CallError::Decode(DecodeError::RemoteInvocation { .. }) => {
                ErrorCategory::Remote
            }
            CallError::Decode(DecodeError::ResponseDecode { .. }) | CallError::Convert(_) => {
                ErrorCategory::Decode
            }
        }
    }
}

/// A failed invocation, carrying the method identity and the resolved URL when one was built.
#[derive(Debug)]
pub struct InvokeError {
    pub method: MethodId,
    pub url: Option<String>,
    pub source: CallError,
}

impl InvokeError {
    pub fn category(&self) -> ErrorCategory {
        self.source.category()
    }

    /// Only remote failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Remote
    }
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(
                f,
                "Failed to invoke '{}' at '{}': {}",
                self.method, url, self.source
            ),
            None => write!(f, "Failed to invoke '{}': {}", self.method, self.source),
        }
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
