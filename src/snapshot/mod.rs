//! Decoding of the stage captures exported by the page.
//!
//! The page hands back a `data:image/...;base64,` string. [`decode`] turns it
//! into one of the closed set of [`Snapshot`] variants; there is exactly one
//! decode path per [`SnapshotFormat`].

mod codec;
mod types;

pub use codec::{decode, decode_named, encode, strip_data_uri};
pub use types::{ImageEncoding, PixelBuffer, Snapshot, SnapshotFormat};
