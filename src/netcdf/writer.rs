//! Writing classic netCDF files.

use crate::error::Result;
use anyhow::{Context, anyhow, bail};
use bytes::BytesMut;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::header::{Attribute, Dimension, Header, NcType, Variable, Version, padded};

/// Supplies the bytes of each variable while a file is serialised.
///
/// Both methods return the unpadded big-endian payload laid out for `header`.
pub trait DataSource {
    fn fixed_data(&mut self, header: &Header, var: &Variable) -> Result<Vec<u8>>;
    fn record_data(&mut self, header: &Header, var: &Variable, record: u64) -> Result<Vec<u8>>;
}

/// Serialise `header` followed by the data of every variable.
///
/// `header` must already be laid out with [`Header::layout`].
pub fn write_dataset<W: Write>(out: W, header: &Header, source: &mut dyn DataSource) -> Result<()> {
    let mut out = BufWriter::new(out);
    out.write_all(&header.encode())?;

    for var in header.fixed_vars() {
        let data = source.fixed_data(header, var)?;
        check_size(header, var, &data)?;
        out.write_all(&data)?;
        write_padding(&mut out, data.len())?;
    }

    let single = header.single_record_var();
    for record in 0..header.numrecs {
        for var in header.record_vars() {
            let data = source.record_data(header, var, record)?;
            check_size(header, var, &data)?;
            out.write_all(&data)?;
            if !single {
                write_padding(&mut out, data.len())?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn check_size(header: &Header, var: &Variable, data: &[u8]) -> Result<()> {
    let expected = header.data_size(var);
    if data.len() as u64 != expected {
        bail!(
            "variable '{}' has {} bytes of data, expected {}",
            var.name,
            data.len(),
            expected
        );
    }
    Ok(())
}

fn write_padding<W: Write>(out: &mut W, len: usize) -> Result<()> {
    let pad = padded(len as u64) as usize - len;
    out.write_all(&[0u8; 3][..pad])?;
    Ok(())
}

/// Encode the part of `values` that belongs to `record` (or all of it for fixed
/// variables). `values` covers the whole variable in row-major order.
pub(crate) fn slab_bytes(
    header: &Header,
    var: &Variable,
    values: &[f64],
    record: Option<u64>,
) -> Result<Vec<u8>> {
    let slab = header.slab_len(var) as usize;
    let range = match record {
        Some(r) => r as usize * slab..(r as usize + 1) * slab,
        None => 0..slab,
    };
    let part = values.get(range).ok_or_else(|| {
        anyhow!(
            "not enough values for variable '{}' ({} given)",
            var.name,
            values.len()
        )
    })?;
    let mut out = BytesMut::with_capacity(part.len() * var.nc_type.size());
    var.nc_type.encode_f64(part, &mut out);
    Ok(out.to_vec())
}

/// Number of values a variable holds in total.
pub(crate) fn total_len(header: &Header, var: &Variable) -> u64 {
    if header.is_record_var(var) {
        header.slab_len(var) * header.numrecs
    } else {
        header.slab_len(var)
    }
}

/// Builds a new classic netCDF file from scratch.
///
/// ```ignore
/// let mut writer = NcWriter::new(Version::Classic);
/// writer.unlimited_dimension("time", 12).global_text("frequency", "mon");
/// writer.variable("time", NcType::Double, &["time"])?
///     .var_text("time", "units", "days since 1850-01-01")?
///     .values("time", (0..12).map(f64::from).collect())?;
/// writer.write("tas.nc")?;
/// ```
#[derive(Debug, Clone)]
pub struct NcWriter {
    header: Header,
    values: HashMap<String, Vec<f64>>,
}

impl NcWriter {
    pub fn new(version: Version) -> Self {
        Self {
            header: Header::new(version),
            values: HashMap::new(),
        }
    }

    pub fn dimension(&mut self, name: &str, len: u64) -> &mut Self {
        self.header.dims.push(Dimension {
            name: name.to_string(),
            len,
            unlimited: false,
        });
        self
    }

    pub fn unlimited_dimension(&mut self, name: &str, numrecs: u64) -> &mut Self {
        self.header.dims.push(Dimension {
            name: name.to_string(),
            len: numrecs,
            unlimited: true,
        });
        self.header.numrecs = numrecs;
        self
    }

    pub fn global_attr(&mut self, attr: Attribute) -> &mut Self {
        self.header.attrs.push(attr);
        self
    }

    pub fn global_text(&mut self, name: &str, value: &str) -> &mut Self {
        self.global_attr(Attribute::text(name, value))
    }

    pub fn variable(&mut self, name: &str, nc_type: NcType, dims: &[&str]) -> Result<&mut Self> {
        let dim_ids = dims
            .iter()
            .map(|d| {
                self.header
                    .dim_index(d)
                    .ok_or_else(|| anyhow!("unknown dimension '{d}' for variable '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        if dim_ids
            .iter()
            .skip(1)
            .any(|&id| self.header.dims[id].unlimited)
        {
            bail!("the unlimited dimension must come first in variable '{name}'");
        }
        self.header.vars.push(Variable {
            name: name.to_string(),
            dim_ids,
            attrs: Vec::new(),
            nc_type,
            begin: 0,
        });
        Ok(self)
    }

    pub fn var_attr(&mut self, var: &str, attr: Attribute) -> Result<&mut Self> {
        let index = self
            .header
            .var_index(var)
            .ok_or_else(|| anyhow!("unknown variable '{var}'"))?;
        self.header.vars[index].attrs.push(attr);
        Ok(self)
    }

    pub fn var_text(&mut self, var: &str, name: &str, value: &str) -> Result<&mut Self> {
        self.var_attr(var, Attribute::text(name, value))
    }

    /// Set every value of a variable, row-major. Unset variables are written as zeros.
    pub fn values(&mut self, var: &str, values: Vec<f64>) -> Result<&mut Self> {
        let variable = self
            .header
            .var(var)
            .ok_or_else(|| anyhow!("unknown variable '{var}'"))?;
        let expected = total_len(&self.header, variable);
        if values.len() as u64 != expected {
            bail!(
                "variable '{var}' expects {expected} values, got {}",
                values.len()
            );
        }
        self.values.insert(var.to_string(), values);
        Ok(self)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut header = self.header.clone();
        header.layout();
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut source = MemorySource {
            values: &self.values,
        };
        write_dataset(file, &header, &mut source)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

struct MemorySource<'a> {
    values: &'a HashMap<String, Vec<f64>>,
}

impl MemorySource<'_> {
    fn bytes(&self, header: &Header, var: &Variable, record: Option<u64>) -> Result<Vec<u8>> {
        match self.values.get(&var.name) {
            Some(values) => slab_bytes(header, var, values, record),
            None => Ok(vec![0; header.data_size(var) as usize]),
        }
    }
}

impl DataSource for MemorySource<'_> {
    fn fixed_data(&mut self, header: &Header, var: &Variable) -> Result<Vec<u8>> {
        self.bytes(header, var, None)
    }

    fn record_data(&mut self, header: &Header, var: &Variable, record: u64) -> Result<Vec<u8>> {
        self.bytes(header, var, Some(record))
    }
}
