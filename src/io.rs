use std::path::Path;

use crate::asset::AssetError;

pub(crate) fn load_binary(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn load_text(path: &Path) -> Result<String, AssetError> {
    std::fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_path() {
        let err = load_text(Path::new("does/not/exist.obj")).unwrap_err();
        match err {
            AssetError::Io { path, .. } => assert_eq!(path, Path::new("does/not/exist.obj")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
