//! Document sources accepted by the extractor.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Partial byte access to a PDF that is not held in memory up front.
///
/// The engine asks for the bytes after [`initial_data`](Self::initial_data)
/// in consecutive `[begin, end)` ranges until `length()` is reached.
pub trait RangeTransport: Send + Sync {
    /// Total document length in bytes.
    fn length(&self) -> u64;

    /// Prefix of the document that is already available.
    fn initial_data(&self) -> &[u8] {
        &[]
    }

    /// Read the bytes in `[begin, end)`.
    fn read_range(&self, begin: u64, end: u64) -> io::Result<Vec<u8>>;
}

/// Where to read a PDF document from.
pub enum Source {
    /// A file on disk.
    Path(PathBuf),
    /// A complete document in memory.
    Bytes(Vec<u8>),
    /// A document fetched range by range.
    Range(Box<dyn RangeTransport>),
}

impl Source {
    /// Wrap a range transport.
    pub fn range(transport: impl RangeTransport + 'static) -> Self {
        Source::Range(Box::new(transport))
    }

    /// Short description of the source kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Path(_) => "path",
            Source::Bytes(_) => "bytes",
            Source::Range(_) => "range",
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Source::Range(transport) => write!(f, "Range({} bytes)", transport.length()),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<String> for Source {
    fn from(path: String) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Bytes(data)
    }
}

impl From<&[u8]> for Source {
    fn from(data: &[u8]) -> Self {
        Source::Bytes(data.to_vec())
    }
}

impl From<Box<dyn RangeTransport>> for Source {
    fn from(transport: Box<dyn RangeTransport>) -> Self {
        Source::Range(transport)
    }
}

/// [`RangeTransport`] over a seekable file.
pub struct FileTransport {
    file: Mutex<File>,
    length: u64,
}

impl FileTransport {
    /// Open a file for ranged reads.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            length,
        })
    }
}

impl RangeTransport for FileTransport {
    fn length(&self) -> u64 {
        self.length
    }

    fn read_range(&self, begin: u64, end: u64) -> io::Result<Vec<u8>> {
        if end < begin || end > self.length {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range {}..{} outside 0..{}", begin, end, self.length),
            ));
        }

        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "file lock poisoned"))?;
        file.seek(SeekFrom::Start(begin))?;
        let len = usize::try_from(end - begin).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range {}..{} does not fit in memory", begin, end),
            )
        })?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}
