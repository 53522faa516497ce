// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patcher document I/O.
//!
//! Documents are read whole, parsed once, and written whole. Output either
//! replaces the original file or lands in a scratch directory under the
//! original's file name.
//!
//! # Output Layout
//!
//! Max writes patchers with tab indentation and `"key" : value` pairs. Scalar
//! arrays stay on one line. An object inside an array opens on the bracket's
//! line, and each following one opens a new line with a leading `, `.
//! [`OutputLayout::Max`] mimics that closely enough for the text scanner in
//! [`scan`](crate::styles::scan) to read our own output
//! back. [`OutputLayout::Compact`] writes everything on one line.

use mkdirp::mkdirp;
use serde::Serialize;
use serde_json::{
    ser::{CompactFormatter, Formatter},
    Serializer, Value,
};
use std::{
    fs::{canonicalize, read_to_string, remove_file, rename, write},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Patcher document loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Where document was read from.
    pub path: PathBuf,

    /// Raw file text.
    pub text: String,

    /// Parsed document tree.
    pub root: Value,
}

impl Document {
    /// Read and parse document at target path.
    ///
    /// # Errors
    ///
    /// - Return [`DocumentError::Read`] if the file cannot be read.
    /// - Return [`DocumentError::Parse`] if the file is not well-formed JSON.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("load patcher document {:?}", path.display());
        let text = read_to_string(&path).map_err(|err| DocumentError::Read {
            source: err,
            path: path.clone(),
        })?;
        let root = serde_json::from_str(&text).map_err(|err| DocumentError::Parse {
            source: err,
            path: path.clone(),
        })?;

        Ok(Self { path, text, root })
    }

    /// Serialize document tree and write it to target path.
    ///
    /// Writes a sibling temporary file first and renames it into place. A
    /// symlinked target is written through, so the link itself survives.
    ///
    /// # Errors
    ///
    /// - Return [`DocumentError::Serialize`] if the tree cannot be serialized.
    /// - Return [`DocumentError::Write`] if the file cannot be written.
    #[instrument(skip(self, path), level = "debug")]
    pub fn write_to(&self, path: impl AsRef<Path>, layout: OutputLayout) -> Result<()> {
        let path = path.as_ref();
        let bytes = render(&self.root, layout)?;
        let write_err = |err| DocumentError::Write {
            source: err,
            path: path.to_path_buf(),
        };

        // INVARIANT: Rename onto the resolved file, never onto a link.
        let resolved = canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut staging = resolved.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        debug!("stage {} bytes at {:?}", bytes.len(), staging.display());

        if let Err(error) = write(&staging, bytes).and_then(|_| rename(&staging, &resolved)) {
            if let Err(cleanup) = remove_file(&staging) {
                debug!("leave staging file {:?}: {cleanup}", staging.display());
            }
            return Err(write_err(error));
        }

        Ok(())
    }
}

/// How serialized documents are laid out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// Tab-indented layout in the style Max writes.
    #[default]
    Max,

    /// Single line.
    Compact,
}

/// Serialize document tree.
///
/// # Errors
///
/// - Return [`DocumentError::Serialize`] if serialization fails.
pub fn render(root: &Value, layout: OutputLayout) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match layout {
        OutputLayout::Max => {
            let mut serializer = Serializer::with_formatter(&mut out, MaxFormatter::default());
            root.serialize(&mut serializer)?;
            out.push(b'\n');
        }
        OutputLayout::Compact => {
            let mut serializer = Serializer::new(&mut out);
            root.serialize(&mut serializer)?;
        }
    }

    Ok(out)
}

/// Determine scratch output path for a document, creating the directory.
///
/// # Errors
///
/// - Return [`DocumentError::NoFileName`] if the original has no file name.
/// - Return [`DocumentError::ScratchDir`] if the directory cannot be created.
pub fn scratch_path(scratch_dir: impl AsRef<Path>, original: impl AsRef<Path>) -> Result<PathBuf> {
    let scratch_dir = scratch_dir.as_ref();
    let original = original.as_ref();
    let file_name = original.file_name().ok_or_else(|| DocumentError::NoFileName {
        path: original.to_path_buf(),
    })?;

    mkdirp(scratch_dir).map_err(|err| DocumentError::ScratchDir {
        source: err,
        path: scratch_dir.to_path_buf(),
    })?;

    Ok(scratch_dir.join(file_name))
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Array { multiline: bool, has_values: bool },
    Object { has_values: bool },
}

/// JSON formatter emulating Max's patcher layout.
#[derive(Debug, Default)]
struct MaxFormatter {
    frames: Vec<Frame>,
    // INVARIANT: Set between `begin_array_value` and the element's first byte.
    pending: Option<bool>,
}

impl MaxFormatter {
    fn depth(&self) -> usize {
        self.frames.len()
    }

    fn indent<W>(&self, writer: &mut W, depth: usize) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for _ in 0..depth {
            writer.write_all(b"\t")?;
        }

        Ok(())
    }

    fn flush_scalar<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match self.pending.take() {
            Some(true) => writer.write_all(b" "),
            Some(false) => writer.write_all(b", "),
            None => Ok(()),
        }
    }

    fn flush_container<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let Some(first) = self.pending.take() else {
            return Ok(());
        };

        writer.write_all(if first { b" " } else { b"\n, " })?;
        self.indent(writer, self.depth())?;
        if let Some(Frame::Array { multiline, .. }) = self.frames.last_mut() {
            *multiline = true;
        }

        Ok(())
    }
}

macro_rules! scalar_methods {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method<W>(&mut self, writer: &mut W, value: $ty) -> io::Result<()>
            where
                W: ?Sized + io::Write,
            {
                self.flush_scalar(writer)?;
                CompactFormatter.$method(writer, value)
            }
        )*
    };
}

impl Formatter for MaxFormatter {
    scalar_methods! {
        write_bool(bool),
        write_i8(i8),
        write_i16(i16),
        write_i32(i32),
        write_i64(i64),
        write_i128(i128),
        write_u8(u8),
        write_u16(u16),
        write_u32(u32),
        write_u64(u64),
        write_u128(u128),
        write_f32(f32),
        write_f64(f64),
        write_number_str(&str),
        write_raw_fragment(&str),
    }

    fn write_null<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.flush_scalar(writer)?;
        writer.write_all(b"null")
    }

    fn begin_string<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.flush_scalar(writer)?;
        writer.write_all(b"\"")
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.flush_container(writer)?;
        self.frames.push(Frame::Array {
            multiline: false,
            has_values: false,
        });
        writer.write_all(b"[")
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match self.frames.pop() {
            Some(Frame::Array {
                multiline: true,
                has_values: true,
            }) => {
                writer.write_all(b"\n")?;
                self.indent(writer, self.depth())?;
                writer.write_all(b"]")
            }
            Some(Frame::Array {
                has_values: true, ..
            }) => writer.write_all(b" ]"),
            _ => writer.write_all(b"]"),
        }
    }

    fn begin_array_value<W>(&mut self, _writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.pending = Some(first);
        Ok(())
    }

    fn end_array_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if let Some(Frame::Array { has_values, .. }) = self.frames.last_mut() {
            *has_values = true;
        }

        Ok(())
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.flush_container(writer)?;
        self.frames.push(Frame::Object { has_values: false });
        writer.write_all(b"{")
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match self.frames.pop() {
            Some(Frame::Object { has_values: true }) => {
                writer.write_all(b"\n")?;
                self.indent(writer, self.depth())?;
                writer.write_all(b"}")
            }
            _ => writer.write_all(b"}"),
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(if first { b"\n" } else { b",\n" })?;
        self.indent(writer, self.depth())
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b" : ")
    }

    fn end_object_value<W>(&mut self, _writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if let Some(Frame::Object { has_values }) = self.frames.last_mut() {
            *has_values = true;
        }

        Ok(())
    }
}

/// Document I/O error types.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Document cannot be read.
    #[error("failed to read patcher document {:?}", path.display())]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Document is not well-formed JSON.
    #[error("failed to parse patcher document {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Document tree cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// Document cannot be written.
    #[error("failed to write patcher document {:?}", path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Scratch directory cannot be created.
    #[error("failed to create scratch directory {:?}", path.display())]
    ScratchDir {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Original path has no file name to reuse.
    #[error("no file name in {:?}", path.display())]
    NoFileName { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = DocumentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::scan::definition_blocks;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({
            "patcher": {
                "rect": [34.0, 94.0],
                "boxes": [
                    { "box": { "id": "obj-1", "style": "A" } },
                    { "box": { "id": "obj-2" } }
                ],
                "styles": [
                    { "name": "A", "multi": 0 },
                    { "name": "B", "multi": 0 }
                ],
                "lines": [],
                "saved_attribute_attributes": {},
                "flag": null
            }
        })
    }

    #[test]
    fn render_max_layout() -> anyhow::Result<()> {
        let result = String::from_utf8(render(&sample(), OutputLayout::Max)?)?;
        let expect = [
            "{",
            "\t\"patcher\" : {",
            "\t\t\"rect\" : [ 34.0, 94.0 ],",
            "\t\t\"boxes\" : [ \t\t\t{",
            "\t\t\t\t\"box\" : {",
            "\t\t\t\t\t\"id\" : \"obj-1\",",
            "\t\t\t\t\t\"style\" : \"A\"",
            "\t\t\t\t}",
            "\t\t\t}",
            ", \t\t\t{",
            "\t\t\t\t\"box\" : {",
            "\t\t\t\t\t\"id\" : \"obj-2\"",
            "\t\t\t\t}",
            "\t\t\t}",
            "\t\t],",
            "\t\t\"styles\" : [ \t\t\t{",
            "\t\t\t\t\"name\" : \"A\",",
            "\t\t\t\t\"multi\" : 0",
            "\t\t\t}",
            ", \t\t\t{",
            "\t\t\t\t\"name\" : \"B\",",
            "\t\t\t\t\"multi\" : 0",
            "\t\t\t}",
            "\t\t],",
            "\t\t\"lines\" : [],",
            "\t\t\"saved_attribute_attributes\" : {},",
            "\t\t\"flag\" : null",
            "\t}",
            "}",
            "",
        ]
        .join("\n");

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn max_layout_round_trips_and_scans() -> anyhow::Result<()> {
        let text = String::from_utf8(render(&sample(), OutputLayout::Max)?)?;
        let reparsed: Value = serde_json::from_str(&text)?;
        assert_eq!(reparsed, sample());

        let names = definition_blocks(&text).map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, vec!["A", "B"]);

        Ok(())
    }

    #[test]
    fn render_compact_layout() -> anyhow::Result<()> {
        let result = String::from_utf8(render(&json!({ "a": [1, 2], "b": {} }), OutputLayout::Compact)?)?;
        assert_eq!(result, r#"{"a":[1,2],"b":{}}"#);

        Ok(())
    }

    #[test]
    fn load_rejects_malformed_json() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("broken.maxpat");
        std::fs::write(&path, "{ \"patcher\" : ")?;

        let result = Document::load(&path);
        assert!(matches!(result, Err(DocumentError::Parse { .. })));

        Ok(())
    }

    #[test]
    fn write_replaces_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("patch.maxpat");
        std::fs::write(&path, r#"{"patcher":{"styles":[]}}"#)?;

        let mut document = Document::load(&path)?;
        document.root["patcher"]["fileversion"] = json!(1);
        document.write_to(&path, OutputLayout::Compact)?;

        assert_eq!(
            std::fs::read_to_string(&path)?,
            r#"{"patcher":{"styles":[],"fileversion":1}}"#
        );
        assert!(!dir.path().join("patch.maxpat.tmp").exists());

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn write_follows_symlink() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let real = dir.path().join("real.maxpat");
        let link = dir.path().join("link.maxpat");
        std::fs::write(&real, r#"{"patcher":{}}"#)?;
        std::os::unix::fs::symlink(&real, &link)?;

        let mut document = Document::load(&link)?;
        document.root["patcher"]["fileversion"] = json!(1);
        document.write_to(&link, OutputLayout::Compact)?;

        assert!(std::fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(
            std::fs::read_to_string(&real)?,
            r#"{"patcher":{"fileversion":1}}"#
        );
        assert!(!dir.path().join("real.maxpat.tmp").exists());

        Ok(())
    }

    #[test]
    fn failed_write_removes_staging_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let blocker = dir.path().join("patch.maxpat");
        std::fs::create_dir_all(blocker.join("occupied"))?;
        let document = Document {
            path: blocker.clone(),
            text: String::new(),
            root: json!({ "patcher": {} }),
        };

        let result = document.write_to(&blocker, OutputLayout::Compact);
        assert!(matches!(result, Err(DocumentError::Write { .. })));
        assert!(!dir.path().join("patch.maxpat.tmp").exists());
        assert!(blocker.join("occupied").is_dir());

        Ok(())
    }

    #[test]
    fn scratch_path_creates_directory() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let scratch = dir.path().join("scratch").join("nested");

        let result = scratch_path(&scratch, "/somewhere/else/patch.maxpat")?;
        assert_eq!(result, scratch.join("patch.maxpat"));
        assert!(scratch.is_dir());

        Ok(())
    }
}
