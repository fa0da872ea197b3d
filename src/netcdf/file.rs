//! Reading and updating existing netCDF files.

use crate::error::{NcTimeError, Result};
use anyhow::{Context, anyhow, bail};
use bytes::BytesMut;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::edit::{Edits, RewriteSource};
use super::header::{Attribute, DecodeError, Header, Variable};
use super::writer::{total_len, write_dataset};

/// Bytes read when first probing a header; grown until the header fits.
const HEADER_CHUNK: u64 = 16 * 1024;

/// An open classic netCDF file: the decoded header plus its location.
///
/// Data is read on demand, so holding an `NcFile` keeps no file descriptor open.
#[derive(Debug, Clone)]
pub struct NcFile {
    path: PathBuf,
    header: Header,
}

impl NcFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| NcTimeError::InvalidNetCdfFile {
            path: path.display().to_string(),
            reason,
        };

        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let file_len = file.metadata()?.len();

        let mut chunk = HEADER_CHUNK;
        let mut header = loop {
            let len = chunk.min(file_len);
            let mut buf = vec![0; len as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)?;
            match Header::decode(&buf) {
                Ok((header, _)) => break header,
                Err(DecodeError::Truncated) if len < file_len => chunk *= 4,
                Err(e) => return Err(invalid(e.to_string()).into()),
            }
        };

        if header.numrecs == u64::MAX {
            let first_record = header.record_vars().map(|v| v.begin).min();
            let numrecs = match (first_record, header.record_size()) {
                (Some(begin), size) if size > 0 => file_len.saturating_sub(begin) / size,
                _ => 0,
            };
            header.set_numrecs(numrecs);
        }

        for var in &header.vars {
            let end = if header.is_record_var(var) {
                match header.numrecs {
                    0 => Some(var.begin),
                    n => (n - 1)
                        .checked_mul(header.record_size())
                        .and_then(|offset| offset.checked_add(var.begin))
                        .and_then(|offset| offset.checked_add(header.data_size(var))),
                }
            } else {
                var.begin.checked_add(header.data_size(var))
            };
            if end.is_none_or(|end| end > file_len) {
                return Err(invalid(format!("data of variable '{}' is truncated", var.name)).into());
            }
        }

        tracing::trace!(path = %path.display(), vars = header.vars.len(), "Opened netCDF file");
        Ok(Self {
            path: path.to_path_buf(),
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn header(&self) -> &Header {
        &self.header
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.header.var(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.header.var(name).is_some()
    }

    /// The variable, or `NoNetCdfVariable`.
    pub fn require_variable(&self, name: &str) -> Result<&Variable> {
        self.header.var(name).ok_or_else(|| {
            NcTimeError::NoNetCdfVariable {
                variable: name.to_string(),
                path: self.path.display().to_string(),
            }
            .into()
        })
    }

    pub fn global_text(&self, name: &str) -> Option<String> {
        self.header.attr(name).and_then(Attribute::as_text)
    }

    pub fn global_attr_names(&self) -> impl Iterator<Item = &str> {
        self.header.attrs.iter().map(|a| a.name.as_str())
    }

    pub fn var_attr(&self, var: &str, name: &str) -> Option<&Attribute> {
        self.header.var(var).and_then(|v| v.attr(name))
    }

    pub fn var_text(&self, var: &str, name: &str) -> Option<String> {
        self.var_attr(var, name).and_then(Attribute::as_text)
    }

    /// Text attribute of a variable, or `NoNetCdfAttribute`.
    pub fn require_var_text(&self, var: &str, name: &str) -> Result<String> {
        self.var_text(var, name).ok_or_else(|| {
            NcTimeError::NoNetCdfAttribute {
                attribute: name.to_string(),
                variable: Some(var.to_string()),
                path: self.path.display().to_string(),
            }
            .into()
        })
    }

    /// Length of the leading dimension of a variable (1 for scalars).
    pub fn leading_len(&self, var: &str) -> Result<u64> {
        let variable = self.require_variable(var)?;
        Ok(variable
            .dim_ids
            .first()
            .map_or(1, |&id| self.header.dims[id].len))
    }

    /// Every value of a numeric variable, row-major.
    pub fn read_f64(&self, name: &str) -> Result<Vec<f64>> {
        let var = self.require_variable(name)?;
        let raw = self.read_raw(var)?;
        var.nc_type
            .decode_f64(&raw)
            .ok_or_else(|| anyhow!("variable '{name}' is not numeric"))
    }

    fn read_raw(&self, var: &Variable) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        if !self.header.is_record_var(var) {
            return self.read_at(&mut file, var.begin, self.header.data_size(var));
        }
        let mut raw = Vec::with_capacity((self.header.data_size(var) * self.header.numrecs) as usize);
        for record in 0..self.header.numrecs {
            raw.extend(self.read_record(&mut file, var, record)?);
        }
        Ok(raw)
    }

    pub(crate) fn read_record(&self, file: &mut File, var: &Variable, record: u64) -> Result<Vec<u8>> {
        let offset = var.begin + record * self.header.record_size();
        self.read_at(file, offset, self.header.data_size(var))
    }

    pub(crate) fn read_fixed(&self, file: &mut File, var: &Variable) -> Result<Vec<u8>> {
        self.read_at(file, var.begin, self.header.data_size(var))
    }

    fn read_at(&self, file: &mut File, offset: u64, len: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0; len as usize];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(buf)
    }

    /// Overwrite every value of a numeric variable in place.
    ///
    /// The value count must match the current shape; the header is left untouched.
    pub fn write_f64(&self, name: &str, values: &[f64]) -> Result<()> {
        let var = self.require_variable(name)?;
        if !var.nc_type.is_numeric() {
            bail!("variable '{name}' is not numeric");
        }
        let expected = total_len(&self.header, var);
        if values.len() as u64 != expected {
            bail!(
                "variable '{name}' holds {expected} values, got {}",
                values.len()
            );
        }

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
        let slab = self.header.slab_len(var) as usize;
        let mut encode_at = |offset: u64, part: &[f64]| -> Result<()> {
            let mut raw = BytesMut::with_capacity(part.len() * var.nc_type.size());
            var.nc_type.encode_f64(part, &mut raw);
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&raw)?;
            Ok(())
        };

        if self.header.is_record_var(var) {
            for (record, part) in values.chunks(slab.max(1)).enumerate() {
                encode_at(var.begin + record as u64 * self.header.record_size(), part)?;
            }
        } else {
            encode_at(var.begin, values)?;
        }
        file.flush()?;
        tracing::debug!(path = %self.path.display(), var = name, "Rewrote values in place");
        Ok(())
    }

    /// Apply `edits` to the file at `path`.
    ///
    /// Value replacements alone are written in place; anything structural goes
    /// through [`NcFile::rewrite`].
    pub fn update(path: impl AsRef<Path>, edits: &Edits) -> Result<()> {
        let path = path.as_ref();
        if edits.is_empty() {
            return Ok(());
        }
        if edits.is_data_only() {
            let file = Self::open(path)?;
            for (name, values) in edits.replacements() {
                file.write_f64(name, values)?;
            }
            return Ok(());
        }
        Self::rewrite(path, edits)
    }

    /// Apply `edits` to the file at `path`, replacing it atomically.
    pub fn rewrite(path: impl AsRef<Path>, edits: &Edits) -> Result<()> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".nctime-")
            .suffix(".nc")
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;

        let source = Self::open(path)?;
        source.write_edited(tmp.as_file_mut(), edits)?;
        let permissions = std::fs::metadata(path)
            .with_context(|| format!("Failed to read metadata of {}", path.display()))?
            .permissions();
        tmp.as_file()
            .set_permissions(permissions)
            .with_context(|| format!("Failed to copy permissions of {}", path.display()))?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Rewrote file");
        Ok(())
    }

    /// Apply `edits` to `src` and write the result to `dst`, which must not exist.
    pub fn rewrite_to(src: impl AsRef<Path>, dst: impl AsRef<Path>, edits: &Edits) -> Result<()> {
        let (src, dst) = (src.as_ref(), dst.as_ref());
        let source = Self::open(src)?;
        let out = File::create_new(dst).with_context(|| format!("Failed to create {}", dst.display()))?;
        if let Err(e) = source.write_edited(out, edits) {
            let _ = std::fs::remove_file(dst);
            return Err(e.context(format!("Failed to write {}", dst.display())));
        }
        tracing::debug!(src = %src.display(), dst = %dst.display(), "Wrote edited copy");
        Ok(())
    }

    fn write_edited<W: Write>(&self, out: W, edits: &Edits) -> Result<()> {
        let header = edits.apply_to_header(&self.header)?;
        let mut source = RewriteSource::new(self, edits)?;
        write_dataset(out, &header, &mut source)
    }
}
