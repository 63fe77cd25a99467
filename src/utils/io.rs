use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Open a file, transparently decompressing gzip/bzip2/xz/zstd input.
pub fn open(path: &Path) -> io::Result<Box<dyn Read>> {
    // Too short to carry a compression magic number
    if fs::metadata(path)?.len() < 5 {
        return Ok(Box::new(fs::File::open(path)?));
    }
    let (reader, _format) = niffler::from_path(path).map_err(|e| match e {
        niffler::Error::IOError(io) => io,
        other => io::Error::other(other),
    })?;
    Ok(reader)
}

pub fn read_to_string(path: &Path) -> io::Result<String> {
    let mut reader = open(path)?;
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// A result file that was never written or is zero bytes long.
pub fn is_missing_or_empty(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.len() == 0,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(is_missing_or_empty(&missing));

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "").unwrap();
        assert!(is_missing_or_empty(&empty));

        let full = dir.path().join("full.json");
        fs::write(&full, "{}").unwrap();
        assert!(!is_missing_or_empty(&full));
        assert_eq!(read_to_string(&full).unwrap(), "{}");
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_to_string(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
