pub mod dimred;
pub mod error;
pub mod linop;
pub mod sparse;
pub mod svd;
mod utils;

pub use utils::IpcasFloat;

pub use error::{IpcasError, Result};

pub use linop::{
    AdjointOperator, LinearOperator, MeanCenterOperator, ResidualProjectionOperator,
    StackedLinearOperator,
};

pub use svd::{
    LanczosSvd, PowerIterationNormalizer, RandomizedSvd, SvdLibOperator, SvdTriplets, TruncatedSvd,
    Which,
};

pub use dimred::{
    FittedState, Ipcas, IpcasBuilder, MergeStrategy, SharedIpcas, VarianceNormalization,
};
