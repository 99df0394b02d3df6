use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Store, StoreError, StoreResult};

/// One `<key>.json` file per record inside a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Store for JsonFileStore {
    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        let temp_path = path.with_extension("tmp");
        {
            let file = fs::File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(value.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        match fs::rename(&temp_path, &path) {
            Ok(()) => Ok(()),
            Err(_) if path.exists() => {
                let _ = fs::remove_file(&path);
                fs::rename(&temp_path, &path).map_err(StoreError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_and_remove() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data")).unwrap();

        assert_eq!(store.read("sessions").unwrap(), None);
        store.write("sessions", "[]").unwrap();
        assert_eq!(store.read("sessions").unwrap().as_deref(), Some("[]\n"));
        assert!(dir.path().join("data").join("sessions.json").exists());

        store.remove("sessions").unwrap();
        store.remove("sessions").unwrap();
        assert_eq!(store.read("sessions").unwrap(), None);
    }

    #[test]
    fn overwrite_replaces_whole_value() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.write("k", "\"a long first value\"").unwrap();
        store.write("k", "\"b\"").unwrap();
        assert_eq!(store.read("k").unwrap().as_deref(), Some("\"b\"\n"));
        assert!(!dir.path().join("k.tmp").exists());
    }

    #[test]
    fn blank_file_reads_as_absent() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("rest-state.json"), "  \n").unwrap();
        assert_eq!(store.read("rest-state").unwrap(), None);
    }
}
