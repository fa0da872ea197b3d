//! Structural edits applied while copying a file.

use crate::error::{NcTimeError, Result};
use anyhow::{Context, anyhow, bail};
use std::collections::HashMap;
use std::fs::File;

use super::file::NcFile;
use super::header::{Attribute, Header, Variable};
use super::writer::{DataSource, slab_bytes, total_len};

/// A set of changes for [`NcFile::rewrite`] and [`NcFile::rewrite_to`].
///
/// Attribute changes target a variable by name, or the global attributes with `None`.
#[derive(Debug, Clone, Default)]
pub struct Edits {
    set_attrs: Vec<(Option<String>, Attribute)>,
    delete_attrs: Vec<(Option<String>, String)>,
    drop_vars: Vec<String>,
    replace: HashMap<String, Vec<f64>>,
    slice: Option<(String, u64)>,
}

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set_attr(mut self, var: Option<&str>, attr: Attribute) -> Self {
        self.set_attrs.push((var.map(str::to_string), attr));
        self
    }

    #[must_use]
    pub fn delete_attr(mut self, var: Option<&str>, name: &str) -> Self {
        self.delete_attrs
            .push((var.map(str::to_string), name.to_string()));
        self
    }

    #[must_use]
    pub fn drop_var(mut self, name: &str) -> Self {
        self.drop_vars.push(name.to_string());
        self
    }

    /// Replace every value of a variable (row-major, in the edited shape).
    #[must_use]
    pub fn replace_values(mut self, name: &str, values: Vec<f64>) -> Self {
        self.replace.insert(name.to_string(), values);
        self
    }

    /// Keep only the indices `from..` of a dimension.
    #[must_use]
    pub fn slice(mut self, dimension: &str, from: u64) -> Self {
        self.slice = Some((dimension.to_string(), from));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set_attrs.is_empty()
            && self.delete_attrs.is_empty()
            && self.drop_vars.is_empty()
            && self.replace.is_empty()
            && self.slice.is_none()
    }

    /// Whether the edits only replace values, so they can be written in place.
    pub fn is_data_only(&self) -> bool {
        self.set_attrs.is_empty()
            && self.delete_attrs.is_empty()
            && self.drop_vars.is_empty()
            && self.slice.is_none()
    }

    pub(crate) fn replacements(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.replace.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The header of the edited file, laid out for writing.
    pub(crate) fn apply_to_header(&self, original: &Header) -> Result<Header> {
        let mut header = original.clone();
        header.vars.retain(|v| !self.drop_vars.contains(&v.name));

        for (var, name) in &self.delete_attrs {
            attrs_mut(&mut header, var.as_deref())?.retain(|a| a.name != *name);
        }
        for (var, attr) in &self.set_attrs {
            let attrs = attrs_mut(&mut header, var.as_deref())?;
            match attrs.iter_mut().find(|a| a.name == attr.name) {
                Some(existing) => *existing = attr.clone(),
                None => attrs.push(attr.clone()),
            }
        }

        if let Some((dimension, from)) = &self.slice {
            let id = header
                .dim_index(dimension)
                .ok_or_else(|| anyhow!("unknown dimension '{dimension}'"))?;
            if let Some(var) = header.vars.iter().find(|v| {
                v.dim_ids.iter().skip(1).any(|&d| d == id)
            }) {
                return Err(NcTimeError::UnsupportedSlice {
                    dimension: dimension.clone(),
                    variable: var.name.clone(),
                }
                .into());
            }
            let len = header.dims[id].len;
            if *from > len {
                bail!("cannot keep {dimension}[{from}..] of a dimension of length {len}");
            }
            if header.dims[id].unlimited {
                header.set_numrecs(len - from);
            } else {
                header.dims[id].len = len - from;
            }
        }

        for (name, values) in &self.replace {
            let var = header
                .var(name)
                .ok_or_else(|| anyhow!("cannot replace values of unknown variable '{name}'"))?;
            if !var.nc_type.is_numeric() {
                bail!("cannot replace values of text variable '{name}'");
            }
            let expected = total_len(&header, var);
            if values.len() as u64 != expected {
                bail!(
                    "variable '{name}' expects {expected} values, got {}",
                    values.len()
                );
            }
        }

        header.layout();
        Ok(header)
    }
}

fn attrs_mut<'h>(header: &'h mut Header, var: Option<&str>) -> Result<&'h mut Vec<Attribute>> {
    match var {
        None => Ok(&mut header.attrs),
        Some(name) => header
            .vars
            .iter_mut()
            .find(|v| v.name == name)
            .map(|v| &mut v.attrs)
            .ok_or_else(|| anyhow!("cannot edit attributes of unknown variable '{name}'")),
    }
}

/// Streams data from an existing file into its edited copy.
pub(crate) struct RewriteSource<'a> {
    original: &'a NcFile,
    edits: &'a Edits,
    file: File,
}

impl<'a> RewriteSource<'a> {
    pub(crate) fn new(original: &'a NcFile, edits: &'a Edits) -> Result<Self> {
        let file = File::open(original.path())
            .with_context(|| format!("Failed to open {}", original.path().display()))?;
        Ok(Self {
            original,
            edits,
            file,
        })
    }

    fn original_var(&self, name: &str) -> Result<&'a Variable> {
        self.original
            .header()
            .var(name)
            .ok_or_else(|| anyhow!("variable '{name}' missing from the original file"))
    }

    /// Leading indices dropped from variables that use the sliced dimension.
    fn sliced_from(&self, var: &Variable, header: &Header) -> u64 {
        match &self.edits.slice {
            Some((dimension, from))
                if var
                    .dim_ids
                    .first()
                    .is_some_and(|&id| header.dims[id].name == *dimension) =>
            {
                *from
            }
            _ => 0,
        }
    }
}

impl DataSource for RewriteSource<'_> {
    fn fixed_data(&mut self, header: &Header, var: &Variable) -> Result<Vec<u8>> {
        if let Some(values) = self.edits.replace.get(&var.name) {
            return slab_bytes(header, var, values, None);
        }
        let original = self.original_var(&var.name)?;
        let mut raw = self.original.read_fixed(&mut self.file, original)?;
        let from = self.sliced_from(var, header);
        if from > 0 {
            let old_header = self.original.header();
            let rows = old_header.shape(original).first().copied().unwrap_or(1).max(1);
            let row_bytes = old_header.data_size(original) / rows;
            raw.drain(..(from * row_bytes) as usize);
        }
        Ok(raw)
    }

    fn record_data(&mut self, header: &Header, var: &Variable, record: u64) -> Result<Vec<u8>> {
        if let Some(values) = self.edits.replace.get(&var.name) {
            return slab_bytes(header, var, values, Some(record));
        }
        let original = self.original_var(&var.name)?;
        let from = self.sliced_from(var, header);
        self.original.read_record(&mut self.file, original, record + from)
    }
}
