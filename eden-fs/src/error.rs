use block_dev::DeviceError;

/// Failure modes of filesystem operations.
///
/// Lookups that merely find nothing are reported through `Option`/`bool`
/// values, not through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A required path component does not resolve.
    NotFound,
    /// The path has no usable final component.
    InvalidPath,
    /// The allocator found no free block.
    NoSpace,
    /// The underlying block device failed a transfer.
    Device,
    /// The boot block carries no EdenFS signature.
    BadSignature,
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<DeviceError> for Error {
    fn from(_: DeviceError) -> Self {
        Self::Device
    }
}
