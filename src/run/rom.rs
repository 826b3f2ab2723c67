use super::mem::MAX_ROM_SIZE;

use std::{
    error::Error,
    ffi::OsStr,
    fmt, io,
    path::{Path, PathBuf},
};

#[derive(Debug)]
pub enum RomError {
    RomUnreadable { path: PathBuf, source: io::Error },
    RomEmpty,
    RomTooLarge { size: usize, max: usize },
}

impl fmt::Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RomError::RomUnreadable { path, source } => {
                write!(f, "ROM \"{}\" could not be read: {}", path.display(), source)
            }
            RomError::RomEmpty => write!(f, "ROM is empty"),
            RomError::RomTooLarge { size, max } => {
                write!(f, "ROM size ({}B) exceeds maximum size ({}B)", size, max)
            }
        }
    }
}

impl Error for RomError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RomError::RomUnreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn check_size(data: &[u8]) -> Result<(), RomError> {
    if data.len() > MAX_ROM_SIZE {
        Err(RomError::RomTooLarge {
            size: data.len(),
            max: MAX_ROM_SIZE,
        })
    } else {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Rom {
    pub name: String,
    pub data: Vec<u8>,
}

impl Rom {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Rom, RomError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| RomError::RomUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

        if data.is_empty() {
            return Err(RomError::RomEmpty);
        }

        check_size(&data)?;

        Ok(Rom {
            name: path
                .file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or("Untitled")
                .into(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_is_memory_after_program_start() {
        assert!(check_size(&[0; MAX_ROM_SIZE]).is_ok());
        assert!(matches!(
            check_size(&[0; MAX_ROM_SIZE + 1]),
            Err(RomError::RomTooLarge { size: 3585, max: 3584 })
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let result = Rom::read("this/rom/does/not/exist.ch8");
        let Err(RomError::RomUnreadable { path, .. }) = result else {
            panic!("expected unreadable ROM error");
        };
        assert_eq!(path, PathBuf::from("this/rom/does/not/exist.ch8"));
    }

    #[test]
    fn reads_rom_name_from_file_stem() {
        let path = std::env::temp_dir().join(format!("c8vm-rom-test-{}.ch8", std::process::id()));
        std::fs::write(&path, [0x60, 0x05, 0x70, 0x03]).expect("write temp ROM");

        let rom = Rom::read(&path).expect("read temp ROM");
        std::fs::remove_file(&path).ok();

        assert_eq!(rom.data, vec![0x60, 0x05, 0x70, 0x03]);
        assert!(rom.name.starts_with("c8vm-rom-test-"));
    }

    #[test]
    fn empty_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("c8vm-empty-test-{}.ch8", std::process::id()));
        std::fs::write(&path, [0u8; 0]).expect("write temp ROM");

        let result = Rom::read(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(RomError::RomEmpty)));
    }
}
