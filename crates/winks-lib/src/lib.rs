pub mod beat;
pub mod config;
pub mod error;
pub mod harmonics;
pub mod ingest;
pub mod io;
pub mod peaks;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod spectral;

pub use beat::*;
pub use config::*;
pub use error::*;
pub use signal::*;
