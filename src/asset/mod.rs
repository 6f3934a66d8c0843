pub mod image;
pub mod obj;

pub use self::image::TextureImage;
pub use obj::{GeometryError, MeshData};

use std::path::PathBuf;

/// Failure to read or decode an asset file.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
}
