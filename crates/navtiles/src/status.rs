//! Status codes for navigation mesh operations

/// Result type for navigation mesh operations
pub type Result<T> = std::result::Result<T, Status>;

/// Failure reasons reported by the mesh, the builder and the queries
///
/// Capacity limits (full output buffers, exhausted search nodes) are not
/// errors: those calls succeed with truncated results.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// An input parameter was invalid
    #[error("invalid parameter")]
    InvalidParam,
    /// Tile data does not start with the expected magic number
    #[error("wrong magic number")]
    WrongMagic,
    /// Tile data was written with another format version
    #[error("wrong data version")]
    WrongVersion,
    /// Tile data is truncated or internally inconsistent
    #[error("data corrupted")]
    DataCorrupted,
    /// A tile is already attached at the requested grid location
    #[error("tile location already occupied")]
    AlreadyOccupied,
    /// Every tile slot is in use
    #[error("no free tile slot")]
    OutOfTiles,
    /// The tile or polygon does not exist, or the reference is stale
    #[error("not found")]
    NotFound,
    /// Two polygons of a path are not connected
    #[error("invalid path")]
    PathInvalid,
}

impl From<std::io::Error> for Status {
    fn from(_: std::io::Error) -> Self {
        Status::DataCorrupted
    }
}
