use thiserror::Error;

/// Error types for hashed array tree operations.
///
/// Errors are terminal for the failing operation and never leave the
/// container in a partially mutated state: allocating operations stage
/// every allocation before touching `len` or the directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HatError {
    /// The index failed the `index < len` precondition.
    ///
    /// Raised by `get`, `get_mut`, `set`, and by `pop` on an empty
    /// container. The container is unchanged.
    #[error("index {index} out of bounds (len: {len})")]
    OutOfBounds {
        /// The offending index.
        index: usize,
        /// The container length at the time of the call.
        len: usize,
    },
    /// The allocator could not provide a new directory or sub-block.
    ///
    /// The container still satisfies every structural invariant and holds
    /// exactly the elements it held before the call.
    #[error("allocation of {bytes} bytes failed")]
    OutOfMemory {
        /// The size of the failed request.
        bytes: usize,
    },
}
