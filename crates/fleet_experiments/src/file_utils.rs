use std::path::{Path, PathBuf};

/// Instance files under `path`: the file itself, or every `.json` file below a folder.
pub fn collect_instance_files(path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    read_folder(path)
}

pub fn read_folder(folder_path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder_path)? {
        let path = entry?.path();
        if path.is_file() {
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        } else if path.is_dir() {
            files.extend(read_folder(&path)?);
        }
    }

    files.sort();

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_folder_finds_nested_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        for name in ["b.json", "a.json", "notes.txt", "nested/c.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        let files = read_folder(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![
                dir.path().join("a.json"),
                dir.path().join("b.json"),
                dir.path().join("nested/c.json"),
            ]
        );
    }

    #[test]
    fn test_single_file_is_taken_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("c101.txt");
        std::fs::write(&file, "{}").unwrap();
        assert_eq!(collect_instance_files(&file).unwrap(), vec![file]);
    }
}
