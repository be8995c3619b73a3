use thiserror::Error;

/// A native graphics call returned a non-success status.
///
/// Every variant names the originating operation so failures can be traced
/// without a debugger attached. Device *loss* is not an error — it is a
/// state reported by [`NativeDevice::state`](super::NativeDevice::state).
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The native call reported a numeric status code.
    #[error("{op} failed; native error code {code:#010x}")]
    Native { op: &'static str, code: u32 },

    /// The backend reported a failure without a numeric code.
    #[error("{op} failed: {reason}")]
    Backend { op: &'static str, reason: String },
}

impl DeviceError {
    #[inline]
    pub fn native(op: &'static str, code: u32) -> Self {
        Self::Native { op, code }
    }

    #[inline]
    pub fn backend(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            op,
            reason: reason.into(),
        }
    }

    /// Name of the operation that failed.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Native { op, .. } | Self::Backend { op, .. } => op,
        }
    }
}
