//! Lazy body producers

use std::{
    fmt::{self, Debug},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Something that can write the raw, unencoded bytes of a message part.
///
/// The message writer applies the transfer encoding on top, so
/// implementations only produce content. They run every time the message
/// is serialized.
pub trait Content: Send + Sync {
    /// Writes the content to `w`
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()>;
}

impl Content for String {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(self.as_bytes())
    }
}

impl Content for &'static str {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(self.as_bytes())
    }
}

impl Content for Vec<u8> {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(self)
    }
}

impl Content for &'static [u8] {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(self)
    }
}

/// Streams a file from disk each time it is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    path: PathBuf,
}

impl FileContent {
    /// Content of the file at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Content for FileContent {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        let mut file = fs::File::open(&self.path)?;
        io::copy(&mut file, w)?;
        Ok(())
    }
}

/// Content produced by a closure, see [`content_fn`]
#[derive(Clone)]
pub struct ContentFn<F>(F);

/// Wraps a closure as [`Content`], for bodies rendered on the fly such as
/// templates.
///
/// ```
/// use std::io::Write;
///
/// use mailwright::message::{content_fn, Content};
///
/// let name = "Kate";
/// let body = content_fn(move |w| write!(w, "Hello {name}!"));
///
/// let mut out = Vec::new();
/// body.write_to(&mut out).unwrap();
/// assert_eq!(out, b"Hello Kate!");
/// ```
pub fn content_fn<F>(f: F) -> ContentFn<F>
where
    F: Fn(&mut dyn Write) -> io::Result<()> + Send + Sync,
{
    ContentFn(f)
}

impl<F> Content for ContentFn<F>
where
    F: Fn(&mut dyn Write) -> io::Result<()> + Send + Sync,
{
    fn write_to(&self, w: &mut dyn Write) -> io::Result<()> {
        (self.0)(w)
    }
}

impl<F> Debug for ContentFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_fails() {
        let content = FileContent::new("/nonexistent/mailwright/file.txt");
        let mut out = Vec::new();
        let err = content.write_to(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(out.is_empty());
    }

    #[test]
    fn file_is_streamed() {
        let path = std::env::temp_dir().join("mailwright_content_test.txt");
        fs::write(&path, "on disk").unwrap();
        let mut out = Vec::new();
        FileContent::new(&path).write_to(&mut out).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(out, b"on disk");
    }
}
