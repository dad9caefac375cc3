use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] bincode::Error),
    #[error(transparent)]
    IntConversion(#[from] std::num::TryFromIntError),
    #[error(transparent)]
    SliceConversion(#[from] std::array::TryFromSliceError),
    #[error("key has {size} bytes, but at most {max} bytes are allowed")]
    KeyTooLarge { size: usize, max: usize },
    #[error("value capacity {0} must be a multiple of 8 and at least 8 bytes")]
    InvalidValueCapacity(usize),
    #[error("density {0} must be larger than 0 and smaller than 1")]
    InvalidDensity(f64),
    #[error("density {density} leaves no room for any key in an array of order {order}")]
    DensityTooLow { density: f64, order: u32 },
    #[error("order {0} is outside of the supported range 1..=30")]
    InvalidOrder(u32),
    #[error("page size {0} is too small, at least 256 bytes are needed")]
    PageSizeTooSmall(usize),
    #[error("a hash table needs at least one bucket")]
    NoBuckets,
    #[error("could not grow the arena to {requested} bytes")]
    ArenaExhausted { requested: usize },
    #[error("the set is invalid because growing its storage failed")]
    Invalidated,
    #[error("invalid set description: {0}")]
    InvalidDescription(String),
}
