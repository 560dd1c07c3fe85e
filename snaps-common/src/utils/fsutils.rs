use std::{
    fs, io,
    path::{Component, Path},
};

/// Checks whether the path is simply a filename, i.e., a normal part of a path.
pub fn is_basename(path: impl AsRef<Path>) -> bool {
    let mut components = path.as_ref().components();
    let Some(Component::Normal(_)) = components.next() else {
        return false;
    };
    components.next().is_none()
}

/// Clears the directory at path, or creates it
pub fn clear_dir(dir: impl AsRef<Path>) -> io::Result<()> {
    let dir = dir.as_ref();
    match fs::symlink_metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if fs::symlink_metadata(&path)?.is_dir() {
                    fs::remove_dir_all(path)?;
                } else {
                    fs::remove_file(path)?;
                }
            }
            Ok(())
        }
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "dir is not a dir",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dir),
        Err(e) => Err(e),
    }
}

/// Creates the directory, and its parents, unless it already exists
pub fn ensure_dir(dir: impl AsRef<Path>) -> io::Result<()> {
    let dir = dir.as_ref();
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "exists but is not a dir",
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dir),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basenames() {
        assert!(is_basename("img_0.png"));
        assert!(!is_basename("a/img_0.png"));
        assert!(!is_basename("/img_0.png"));
        assert!(!is_basename(".."));
        assert!(!is_basename(""));
    }

    #[test]
    fn clear_existing_dir() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("snaps");
        fs::create_dir(&dir)?;
        fs::write(dir.join("img_0.png"), b"x")?;
        fs::create_dir(dir.join("nested"))?;
        fs::write(dir.join("nested").join("f"), b"x")?;

        clear_dir(&dir)?;
        assert!(dir.is_dir());
        assert_eq!(0, fs::read_dir(&dir)?.count());
        Ok(())
    }

    #[test]
    fn clear_creates_missing_dir() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("snaps");
        clear_dir(&dir)?;
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn clear_refuses_files() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let file = tmp.path().join("file");
        fs::write(&file, b"x")?;
        assert!(clear_dir(&file).is_err());
        assert!(file.is_file());
        Ok(())
    }

    #[test]
    fn ensure_dir_keeps_content() -> io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let dir = tmp.path().join("a").join("b");
        ensure_dir(&dir)?;
        assert!(dir.is_dir());

        fs::write(dir.join("img_0.png"), b"x")?;
        ensure_dir(&dir)?;
        assert!(dir.join("img_0.png").is_file());

        assert!(ensure_dir(dir.join("img_0.png")).is_err());
        Ok(())
    }
}
