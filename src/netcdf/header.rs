//! Classic netCDF header model and its binary encoding.
//!
//! Covers the CDF-1 (classic), CDF-2 (64-bit offset) and CDF-5 (64-bit data)
//! variants. All integers are big-endian; names and attribute payloads are padded to
//! four bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

const MAGIC: &[u8; 3] = b"CDF";
const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;
const STREAMING: u32 = 0xFFFF_FFFF;

/// Errors found while decoding a header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of header")]
    Truncated,
    #[error("not a classic netCDF file (bad magic number)")]
    BadMagic,
    #[error("unsupported netCDF format version {0}")]
    Version(u8),
    #[error("unknown nc_type {0}")]
    Type(u32),
    #[error("unexpected list tag {0:#x}")]
    Tag(u32),
    #[error("name is not valid UTF-8")]
    Name,
    #[error("dimension id {0} out of range")]
    Dimension(u64),
    #[error("declared sizes exceed the addressable range")]
    Oversized,
}

/// On-disk format variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Classic,
    Offset64,
    Data64,
}

impl Version {
    const fn byte(self) -> u8 {
        match self {
            Self::Classic => 1,
            Self::Offset64 => 2,
            Self::Data64 => 5,
        }
    }

    const fn wide_counts(self) -> bool {
        matches!(self, Self::Data64)
    }

    const fn wide_offsets(self) -> bool {
        !matches!(self, Self::Classic)
    }
}

/// External data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    UByte,
    UShort,
    UInt,
    Int64,
    UInt64,
}

impl NcType {
    const fn code(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Char => 2,
            Self::Short => 3,
            Self::Int => 4,
            Self::Float => 5,
            Self::Double => 6,
            Self::UByte => 7,
            Self::UShort => 8,
            Self::UInt => 9,
            Self::Int64 => 10,
            Self::UInt64 => 11,
        }
    }

    const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Byte,
            2 => Self::Char,
            3 => Self::Short,
            4 => Self::Int,
            5 => Self::Float,
            6 => Self::Double,
            7 => Self::UByte,
            8 => Self::UShort,
            9 => Self::UInt,
            10 => Self::Int64,
            11 => Self::UInt64,
            _ => return None,
        })
    }

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Byte | Self::Char | Self::UByte => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Float => 4,
            Self::Double | Self::Int64 | Self::UInt64 => 8,
        }
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Char)
    }

    /// Decode big-endian values as `f64`. Returns `None` for text.
    pub fn decode_f64(self, mut raw: &[u8]) -> Option<Vec<f64>> {
        if !self.is_numeric() {
            return None;
        }
        let mut values = Vec::with_capacity(raw.len() / self.size());
        while raw.remaining() >= self.size() {
            values.push(match self {
                Self::Byte => f64::from(raw.get_i8()),
                Self::UByte | Self::Char => f64::from(raw.get_u8()),
                Self::Short => f64::from(raw.get_i16()),
                Self::UShort => f64::from(raw.get_u16()),
                Self::Int => f64::from(raw.get_i32()),
                Self::UInt => f64::from(raw.get_u32()),
                Self::Float => f64::from(raw.get_f32()),
                Self::Double => raw.get_f64(),
                Self::Int64 => raw.get_i64() as f64,
                Self::UInt64 => raw.get_u64() as f64,
            });
        }
        Some(values)
    }

    /// Encode `f64` values as big-endian elements of this type. Integers are rounded.
    pub fn encode_f64(self, values: &[f64], out: &mut BytesMut) {
        for &v in values {
            match self {
                Self::Byte => out.put_i8(v.round() as i8),
                Self::UByte | Self::Char => out.put_u8(v.round() as u8),
                Self::Short => out.put_i16(v.round() as i16),
                Self::UShort => out.put_u16(v.round() as u16),
                Self::Int => out.put_i32(v.round() as i32),
                Self::UInt => out.put_u32(v.round() as u32),
                Self::Float => out.put_f32(v as f32),
                Self::Double => out.put_f64(v),
                Self::Int64 => out.put_i64(v.round() as i64),
                Self::UInt64 => out.put_u64(v.round() as u64),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    /// Current length; for the unlimited dimension this mirrors the record count.
    pub len: u64,
    pub unlimited: bool,
}

/// An attribute with its raw big-endian payload (unpadded).
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub nc_type: NcType,
    pub raw: Bytes,
}

impl Attribute {
    pub fn text(name: impl Into<String>, value: &str) -> Self {
        Self {
            name: name.into(),
            nc_type: NcType::Char,
            raw: Bytes::copy_from_slice(value.as_bytes()),
        }
    }

    pub fn numeric(name: impl Into<String>, nc_type: NcType, values: &[f64]) -> Self {
        let mut raw = BytesMut::with_capacity(values.len() * nc_type.size());
        nc_type.encode_f64(values, &mut raw);
        Self {
            name: name.into(),
            nc_type,
            raw: raw.freeze(),
        }
    }

    /// Text value with trailing NUL padding removed.
    pub fn as_text(&self) -> Option<String> {
        (self.nc_type == NcType::Char).then(|| {
            String::from_utf8_lossy(&self.raw)
                .trim_end_matches('\0')
                .to_string()
        })
    }

    pub fn as_f64(&self) -> Option<Vec<f64>> {
        self.nc_type.decode_f64(&self.raw)
    }

    fn element_count(&self) -> usize {
        self.raw.len() / self.nc_type.size()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dim_ids: Vec<usize>,
    pub attrs: Vec<Attribute>,
    pub nc_type: NcType,
    /// Offset of the first byte of data (of the first record for record variables).
    pub begin: u64,
}

impl Variable {
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

/// Full header of a classic netCDF file.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: Version,
    pub numrecs: u64,
    pub dims: Vec<Dimension>,
    pub attrs: Vec<Attribute>,
    pub vars: Vec<Variable>,
}

/// Round a byte count up to the next multiple of four.
pub const fn padded(len: u64) -> u64 {
    (len + 3) & !3
}

impl Header {
    /// Reject headers whose variable sizes overflow, so later size arithmetic is safe.
    fn check_sizes(&self) -> Result<(), DecodeError> {
        for var in &self.vars {
            let skip = usize::from(self.is_record_var(var));
            var.dim_ids[skip..]
                .iter()
                .try_fold(var.nc_type.size() as u64, |acc, &id| acc.checked_mul(self.dims[id].len))
                .and_then(|size| size.checked_add(3))
                .ok_or(DecodeError::Oversized)?;
        }
        self.record_vars()
            .try_fold(0u64, |acc, var| acc.checked_add(padded(self.data_size(var))))
            .ok_or(DecodeError::Oversized)?;
        Ok(())
    }

    pub const fn new(version: Version) -> Self {
        Self {
            version,
            numrecs: 0,
            dims: Vec::new(),
            attrs: Vec::new(),
            vars: Vec::new(),
        }
    }

    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }

    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// Update the record count together with the unlimited dimension length.
    pub fn set_numrecs(&mut self, numrecs: u64) {
        self.numrecs = numrecs;
        for dim in self.dims.iter_mut().filter(|d| d.unlimited) {
            dim.len = numrecs;
        }
    }

    pub fn is_record_var(&self, var: &Variable) -> bool {
        var.dim_ids
            .first()
            .is_some_and(|&id| self.dims[id].unlimited)
    }

    /// Shape of a variable, record dimension included.
    pub fn shape(&self, var: &Variable) -> Vec<u64> {
        var.dim_ids.iter().map(|&id| self.dims[id].len).collect()
    }

    /// Elements per record for record variables, total elements otherwise.
    pub fn slab_len(&self, var: &Variable) -> u64 {
        let skip = usize::from(self.is_record_var(var));
        var.dim_ids[skip..]
            .iter()
            .map(|&id| self.dims[id].len)
            .product()
    }

    /// Unpadded data size in bytes (per record for record variables).
    pub fn data_size(&self, var: &Variable) -> u64 {
        self.slab_len(var) * var.nc_type.size() as u64
    }

    pub fn record_vars(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter().filter(|v| self.is_record_var(v))
    }

    pub fn fixed_vars(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter().filter(|v| !self.is_record_var(v))
    }

    /// Whether record data is written without per-variable padding.
    ///
    /// A lone record variable is stored unpadded.
    pub fn single_record_var(&self) -> bool {
        self.record_vars().count() == 1
    }

    /// Bytes between the starts of two consecutive records.
    pub fn record_size(&self) -> u64 {
        if self.single_record_var() {
            self.record_vars().map(|v| self.data_size(v)).sum()
        } else {
            self.record_vars().map(|v| padded(self.data_size(v))).sum()
        }
    }

    /// Assign `begin` offsets for a freshly written file: fixed variables right after
    /// the header, then interleaved records.
    pub fn layout(&mut self) {
        loop {
            let mut offset = self.encoded_len() as u64;
            let single = self.single_record_var();
            let sizes: Vec<(bool, u64)> = self
                .vars
                .iter()
                .map(|v| (self.is_record_var(v), self.data_size(v)))
                .collect();

            for (var, &(is_record, size)) in self.vars.iter_mut().zip(&sizes) {
                if !is_record {
                    var.begin = offset;
                    offset += padded(size);
                }
            }
            for (var, &(is_record, size)) in self.vars.iter_mut().zip(&sizes) {
                if is_record {
                    var.begin = offset;
                    offset += if single { size } else { padded(size) };
                }
            }

            let overflow = self.vars.iter().any(|v| v.begin > u64::from(u32::MAX));
            if overflow && self.version == Version::Classic {
                self.version = Version::Offset64;
                continue;
            }
            break;
        }
    }

    /// Size of the encoded header in bytes.
    pub fn encoded_len(&self) -> usize {
        self.encode().len()
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(1024);
        out.put_slice(MAGIC);
        out.put_u8(self.version.byte());
        self.put_count(&mut out, self.numrecs);

        if self.dims.is_empty() {
            self.put_absent(&mut out);
        } else {
            out.put_u32(NC_DIMENSION);
            self.put_count(&mut out, self.dims.len() as u64);
            for dim in &self.dims {
                self.put_name(&mut out, &dim.name);
                self.put_count(&mut out, if dim.unlimited { 0 } else { dim.len });
            }
        }

        self.put_attrs(&mut out, &self.attrs);

        if self.vars.is_empty() {
            self.put_absent(&mut out);
        } else {
            out.put_u32(NC_VARIABLE);
            self.put_count(&mut out, self.vars.len() as u64);
            for var in &self.vars {
                self.put_name(&mut out, &var.name);
                self.put_count(&mut out, var.dim_ids.len() as u64);
                for &id in &var.dim_ids {
                    self.put_count(&mut out, id as u64);
                }
                self.put_attrs(&mut out, &var.attrs);
                out.put_u32(var.nc_type.code());
                let vsize = padded(self.data_size(var));
                if self.version.wide_counts() {
                    out.put_u64(vsize);
                } else {
                    out.put_u32(u32::try_from(vsize).unwrap_or(u32::MAX));
                }
                if self.version.wide_offsets() {
                    out.put_u64(var.begin);
                } else {
                    out.put_u32(var.begin as u32);
                }
            }
        }
        out
    }

    fn put_count(&self, out: &mut BytesMut, count: u64) {
        if self.version.wide_counts() {
            out.put_u64(count);
        } else {
            out.put_u32(count as u32);
        }
    }

    fn put_absent(&self, out: &mut BytesMut) {
        out.put_u32(0);
        self.put_count(out, 0);
    }

    fn put_name(&self, out: &mut BytesMut, name: &str) {
        self.put_count(out, name.len() as u64);
        out.put_slice(name.as_bytes());
        put_padding(out, name.len());
    }

    fn put_attrs(&self, out: &mut BytesMut, attrs: &[Attribute]) {
        if attrs.is_empty() {
            self.put_absent(out);
            return;
        }
        out.put_u32(NC_ATTRIBUTE);
        self.put_count(out, attrs.len() as u64);
        for attr in attrs {
            self.put_name(out, &attr.name);
            out.put_u32(attr.nc_type.code());
            self.put_count(out, attr.element_count() as u64);
            out.put_slice(&attr.raw);
            put_padding(out, attr.raw.len());
        }
    }

    /// Decode a header from the beginning of a file.
    ///
    /// Returns the header and the number of bytes it occupies. A streaming record
    /// count is reported as `u64::MAX` and must be resolved by the caller.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let mut cur = Cursor { buf: bytes, version: Version::Classic };
        if cur.buf.remaining() < 4 {
            return Err(DecodeError::Truncated);
        }
        if &cur.buf[..3] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        cur.buf.advance(3);
        cur.version = match cur.buf.get_u8() {
            1 => Version::Classic,
            2 => Version::Offset64,
            5 => Version::Data64,
            other => return Err(DecodeError::Version(other)),
        };

        let numrecs = if cur.version.wide_counts() {
            cur.u64()?
        } else {
            match cur.u32()? {
                STREAMING => u64::MAX,
                n => u64::from(n),
            }
        };

        let mut dims = Vec::new();
        for _ in 0..cur.list(NC_DIMENSION)? {
            let name = cur.name()?;
            let len = cur.count()?;
            dims.push(Dimension {
                name,
                len: if len == 0 { numrecs } else { len },
                unlimited: len == 0,
            });
        }

        let attrs = cur.attrs()?;

        let mut vars = Vec::new();
        for _ in 0..cur.list(NC_VARIABLE)? {
            let name = cur.name()?;
            let ndims = cur.count()?;
            let mut dim_ids = Vec::with_capacity(ndims.min(64) as usize);
            for _ in 0..ndims {
                let id = cur.count()?;
                if id >= dims.len() as u64 {
                    return Err(DecodeError::Dimension(id));
                }
                dim_ids.push(id as usize);
            }
            let attrs = cur.attrs()?;
            let nc_type = cur.nc_type()?;
            let _vsize = cur.count()?;
            let begin = if cur.version.wide_offsets() {
                cur.u64()?
            } else {
                u64::from(cur.u32()?)
            };
            vars.push(Variable {
                name,
                dim_ids,
                attrs,
                nc_type,
                begin,
            });
        }

        let consumed = bytes.len() - cur.buf.len();
        let header = Self {
            version: cur.version,
            numrecs,
            dims,
            attrs,
            vars,
        };
        header.check_sizes()?;
        Ok((header, consumed))
    }
}

fn put_padding(out: &mut BytesMut, len: usize) {
    let pad = padded(len as u64) as usize - len;
    out.put_bytes(0, pad);
}

struct Cursor<'a> {
    buf: &'a [u8],
    version: Version,
}

impl<'a> Cursor<'a> {
    fn u32(&mut self) -> Result<u32, DecodeError> {
        if self.buf.remaining() < 4 {
            return Err(DecodeError::Truncated);
        }
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        if self.buf.remaining() < 8 {
            return Err(DecodeError::Truncated);
        }
        Ok(self.buf.get_u64())
    }

    fn count(&mut self) -> Result<u64, DecodeError> {
        if self.version.wide_counts() {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8], DecodeError> {
        let padded_len = len
            .checked_add(3)
            .map(|l| l & !3)
            .ok_or(DecodeError::Oversized)?;
        if (self.buf.remaining() as u64) < padded_len {
            return Err(DecodeError::Truncated);
        }
        let (head, tail) = self.buf.split_at(padded_len as usize);
        self.buf = tail;
        Ok(&head[..len as usize])
    }

    fn name(&mut self) -> Result<String, DecodeError> {
        let len = self.count()?;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::Name)
    }

    fn nc_type(&mut self) -> Result<NcType, DecodeError> {
        let code = self.u32()?;
        NcType::from_code(code).ok_or(DecodeError::Type(code))
    }

    /// Read a list tag and its element count; `ABSENT` yields zero.
    fn list(&mut self, expected: u32) -> Result<u64, DecodeError> {
        let tag = self.u32()?;
        let count = self.count()?;
        match tag {
            0 if count == 0 => Ok(0),
            t if t == expected => Ok(count),
            t => Err(DecodeError::Tag(t)),
        }
    }

    fn attrs(&mut self) -> Result<Vec<Attribute>, DecodeError> {
        let mut attrs = Vec::new();
        for _ in 0..self.list(NC_ATTRIBUTE)? {
            let name = self.name()?;
            let nc_type = self.nc_type()?;
            let count = self.count()?;
            let len = count
                .checked_mul(nc_type.size() as u64)
                .ok_or(DecodeError::Oversized)?;
            let raw = self.take(len)?;
            attrs.push(Attribute {
                name,
                nc_type,
                raw: Bytes::copy_from_slice(raw),
            });
        }
        Ok(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    fn sample_header(version: Version) -> Header {
        let mut header = Header::new(version);
        header.dims.push(Dimension {
            name: "time".into(),
            len: 3,
            unlimited: true,
        });
        header.dims.push(Dimension {
            name: "bnds".into(),
            len: 2,
            unlimited: false,
        });
        header.numrecs = 3;
        header.attrs.push(Attribute::text("frequency", "mon"));
        header.vars.push(Variable {
            name: "time".into(),
            dim_ids: vec![0],
            attrs: vec![Attribute::text("units", "days since 1850-01-01")],
            nc_type: NcType::Double,
            begin: 0,
        });
        header.vars.push(Variable {
            name: "time_bnds".into(),
            dim_ids: vec![0, 1],
            attrs: vec![],
            nc_type: NcType::Double,
            begin: 0,
        });
        header.vars.push(Variable {
            name: "lat".into(),
            dim_ids: vec![1],
            attrs: vec![Attribute::numeric("valid_range", NcType::Float, &[-90.0, 90.0])],
            nc_type: NcType::Short,
            begin: 0,
        });
        header.layout();
        header
    }

    #[test]
    fn header_survives_encoding_in_every_version() {
        for version in [Version::Classic, Version::Offset64, Version::Data64] {
            let header = sample_header(version);
            let encoded = header.encode();
            let_assert!(Ok((decoded, consumed)) = Header::decode(&encoded));
            check!(consumed == encoded.len());
            check!(decoded == header);
        }
    }

    #[test]
    fn layout_places_fixed_variables_before_records() {
        let header = sample_header(Version::Classic);
        let header_len = header.encoded_len() as u64;
        let lat = header.var("lat").unwrap();
        let time = header.var("time").unwrap();
        let bounds = header.var("time_bnds").unwrap();
        // two shorts padded to four bytes
        check!(lat.begin == header_len);
        check!(time.begin == header_len + 4);
        check!(bounds.begin == time.begin + 8);
        check!(header.record_size() == 24);
    }

    #[test]
    fn single_record_variable_is_not_padded() {
        let mut header = Header::new(Version::Classic);
        header.dims.push(Dimension {
            name: "time".into(),
            len: 4,
            unlimited: true,
        });
        header.numrecs = 4;
        header.vars.push(Variable {
            name: "flag".into(),
            dim_ids: vec![0],
            attrs: vec![],
            nc_type: NcType::Short,
            begin: 0,
        });
        check!(header.record_size() == 2);
    }

    #[test]
    fn rejects_foreign_files() {
        let_assert!(Err(DecodeError::BadMagic) = Header::decode(b"\x89HDF\r\n\x1a\n"));
        let_assert!(Err(DecodeError::Version(3)) = Header::decode(b"CDF\x03"));
        let_assert!(Err(DecodeError::Truncated) = Header::decode(b"CDF\x01\x00\x00"));
    }

    /// CDF-5 prefix: magic, zero records, no dimensions, then one global attribute.
    fn cdf5_with_attribute(name_len: u64, nc_type: u32, count: u64) -> Vec<u8> {
        let mut raw = BytesMut::new();
        raw.put_slice(b"CDF\x05");
        raw.put_u64(0);
        raw.put_u32(0);
        raw.put_u64(0);
        raw.put_u32(NC_ATTRIBUTE);
        raw.put_u64(1);
        raw.put_u64(name_len);
        raw.put_slice(b"a\0\0\0");
        raw.put_u32(nc_type);
        raw.put_u64(count);
        raw.to_vec()
    }

    #[test]
    fn oversized_declarations_are_rejected() {
        let_assert!(Err(DecodeError::Oversized) = Header::decode(&cdf5_with_attribute(u64::MAX, 2, 1)));
        // 8-byte doubles times a count near u64::MAX
        let_assert!(Err(DecodeError::Oversized) = Header::decode(&cdf5_with_attribute(1, 6, u64::MAX / 4)));
        let_assert!(Err(DecodeError::Truncated) = Header::decode(&cdf5_with_attribute(1, 6, 1)));
    }

    #[test]
    fn text_attributes_drop_trailing_nuls() {
        let attr = Attribute {
            name: "calendar".into(),
            nc_type: NcType::Char,
            raw: Bytes::from_static(b"noleap\0\0"),
        };
        check!(attr.as_text().as_deref() == Some("noleap"));
        check!(attr.as_f64().is_none());
    }

    #[test]
    fn numeric_attributes_decode_as_f64() {
        let attr = Attribute::numeric("missing_value", NcType::Int, &[-999.0, 7.0]);
        check!(attr.as_f64() == Some(vec![-999.0, 7.0]));
        check!(attr.as_text().is_none());
    }
}
