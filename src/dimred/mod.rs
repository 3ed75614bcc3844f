//! # Dimensionality Reduction
//!
//! ## Currently Available
//! - **IPCAS** ([`ipcas`]): incremental PCA over a stream of row batches,
//!   backed by matrix-free operators and a pluggable truncated SVD

pub mod ipcas;

pub use ipcas::{
    FittedState, Ipcas, IpcasBuilder, MergeStrategy, SharedIpcas, VarianceNormalization,
};
