//! Error types for gridshift

use thiserror::Error;

/// Main error type for gridshift operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Compute device error: {0}")]
    Device(String),

    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    #[error("Computation interrupted before completion")]
    Interrupted,

    #[error("Class {class} is not part of the class domain")]
    UnknownClass { class: u16 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for gridshift operations
pub type Result<T> = std::result::Result<T, Error>;
