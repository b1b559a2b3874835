//! ChannelFE — non-destructive per-channel (Blue / Green / Red) image
//! adjustment, globally or inside a rectangular region of interest.
//!
//! Uploads are decoded into immutable [`PixelBuffer`]s and held by an
//! [`EditSession`] per image handle. Every adjustment is recomputed from the
//! untouched original, with saturating arithmetic, and the encoded preview
//! is kept in a [`ResultStore`] from which it can be saved or fetched.

pub mod logger;

pub mod buffer;
pub mod cli;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod io;
pub mod ops;
pub mod region;
pub mod request;
pub mod session;
pub mod store;

pub use buffer::PixelBuffer;
pub use config::EngineConfig;
pub use engine::{Engine, ImageHandle, PreviewHandle, StoredHandle};
pub use error::{DecodeError, EncodeError, EngineError, Result};
pub use ops::adjustments::{ChannelOffsets, apply_channel_offsets};
pub use region::{RawRect, Region};
pub use request::AdjustRequest;
pub use session::{EditSession, SessionState};
pub use store::{DirStore, MemoryStore, ResultStore};
