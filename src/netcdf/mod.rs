//! Pure-Rust access to classic-format netCDF files (CDF-1, CDF-2 and CDF-5).
//!
//! Only what time axis checks need is supported: reading headers and numeric
//! variables, overwriting values in place, and rewriting a file with attribute,
//! variable or record-range changes. HDF5-based netCDF-4 files are rejected.

mod edit;
mod file;
pub mod header;
mod writer;

pub use edit::Edits;
pub use file::NcFile;
pub use header::{Attribute, Dimension, Header, NcType, Variable, Version};
pub use writer::{DataSource, NcWriter, write_dataset};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NcTimeError;
    use assert2::{check, let_assert};
    use tempfile::TempDir;

    /// Three monthly records with bounds and a fixed coordinate.
    fn write_sample(dir: &TempDir, version: Version) -> std::path::PathBuf {
        let path = dir.path().join("tas_Amon_model_historical_r1i1p1_185001-185003.nc");
        let mut writer = NcWriter::new(version);
        writer
            .unlimited_dimension("time", 3)
            .dimension("bnds", 2)
            .dimension("lat", 2)
            .global_text("frequency", "mon");
        writer
            .variable("time", NcType::Double, &["time"])
            .unwrap()
            .var_text("time", "units", "days since 1850-01-01")
            .unwrap()
            .var_text("time", "bounds", "time_bnds")
            .unwrap()
            .values("time", vec![15.5, 45.0, 74.5])
            .unwrap();
        writer
            .variable("time_bnds", NcType::Double, &["time", "bnds"])
            .unwrap()
            .values("time_bnds", vec![0.0, 31.0, 31.0, 59.0, 59.0, 90.0])
            .unwrap();
        writer
            .variable("lat", NcType::Float, &["lat"])
            .unwrap()
            .values("lat", vec![-45.0, 45.0])
            .unwrap();
        writer
            .variable("tas", NcType::Float, &["time", "lat"])
            .unwrap()
            .var_text("tas", "cell_methods", "time: mean")
            .unwrap()
            .values("tas", vec![280.0, 281.0, 282.0, 283.0, 284.0, 285.0])
            .unwrap();
        writer.write(&path).unwrap();
        path
    }

    #[test]
    fn reads_back_written_values() {
        let dir = TempDir::new().unwrap();
        for version in [Version::Classic, Version::Offset64, Version::Data64] {
            let path = write_sample(&dir, version);
            let_assert!(Ok(file) = NcFile::open(&path));
            check!(file.header().version == version);
            check!(file.header().numrecs == 3);
            check!(file.read_f64("time").unwrap() == vec![15.5, 45.0, 74.5]);
            check!(file.read_f64("tas").unwrap() == vec![280.0, 281.0, 282.0, 283.0, 284.0, 285.0]);
            check!(file.read_f64("lat").unwrap() == vec![-45.0, 45.0]);
            check!(file.var_text("time", "units").as_deref() == Some("days since 1850-01-01"));
            check!(file.global_text("frequency").as_deref() == Some("mon"));
            std::fs::remove_file(&path).unwrap();
        }
    }

    #[test]
    fn missing_variables_and_attributes_are_domain_errors() {
        let dir = TempDir::new().unwrap();
        let file = NcFile::open(write_sample(&dir, Version::Classic)).unwrap();

        let err = file.read_f64("pr").unwrap_err();
        let_assert!(Some(NcTimeError::NoNetCdfVariable { variable, .. }) = err.downcast_ref::<NcTimeError>());
        check!(variable == "pr");

        let err = file.require_var_text("time", "calendar").unwrap_err();
        let_assert!(Some(NcTimeError::NoNetCdfAttribute { attribute, .. }) = err.downcast_ref::<NcTimeError>());
        check!(attribute == "calendar");
    }

    #[test]
    fn rejects_non_netcdf_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.nc");
        std::fs::write(&path, b"\x89HDF\r\n\x1a\nnot really").unwrap();
        let err = NcFile::open(&path).unwrap_err();
        let_assert!(Some(NcTimeError::InvalidNetCdfFile { .. }) = err.downcast_ref::<NcTimeError>());
    }

    #[test]
    fn rejects_overflowing_attribute_sizes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oversized.nc");
        let mut raw = b"CDF\x05".to_vec();
        raw.extend_from_slice(&[0; 8]);
        raw.extend_from_slice(&[0; 12]);
        raw.extend_from_slice(&0x0Cu32.to_be_bytes());
        raw.extend_from_slice(&1u64.to_be_bytes());
        raw.extend_from_slice(&1u64.to_be_bytes());
        raw.extend_from_slice(b"a\0\0\0");
        raw.extend_from_slice(&6u32.to_be_bytes());
        raw.extend_from_slice(&(u64::MAX / 4).to_be_bytes());
        std::fs::write(&path, raw).unwrap();

        let err = NcFile::open(&path).unwrap_err();
        let_assert!(Some(NcTimeError::InvalidNetCdfFile { .. }) = err.downcast_ref::<NcTimeError>());
    }

    #[test]
    fn writes_values_in_place() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, Version::Classic);
        let file = NcFile::open(&path).unwrap();
        file.write_f64("time", &[15.5, 45.0, 74.5].map(|v| v + 1.0)).unwrap();

        let reopened = NcFile::open(&path).unwrap();
        check!(reopened.read_f64("time").unwrap() == vec![16.5, 46.0, 75.5]);
        check!(reopened.read_f64("time_bnds").unwrap() == vec![0.0, 31.0, 31.0, 59.0, 59.0, 90.0]);
        check!(file.write_f64("time", &[1.0]).is_err());
    }

    #[test]
    fn rewrite_edits_attributes_and_drops_variables() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, Version::Classic);
        let edits = Edits::new()
            .set_attr(Some("time"), Attribute::text("calendar", "noleap"))
            .set_attr(Some("time"), Attribute::text("units", "hours since 1850-01-01"))
            .delete_attr(Some("time"), "bounds")
            .drop_var("time_bnds");
        NcFile::rewrite(&path, &edits).unwrap();

        let file = NcFile::open(&path).unwrap();
        check!(!file.has_variable("time_bnds"));
        check!(file.var_text("time", "calendar").as_deref() == Some("noleap"));
        check!(file.var_text("time", "units").as_deref() == Some("hours since 1850-01-01"));
        check!(file.var_text("time", "bounds").is_none());
        check!(file.read_f64("tas").unwrap() == vec![280.0, 281.0, 282.0, 283.0, 284.0, 285.0]);
        check!(file.read_f64("lat").unwrap() == vec![-45.0, 45.0]);
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, Version::Classic);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        NcFile::rewrite(&path, &Edits::new().drop_var("time_bnds")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        check!(mode & 0o777 == 0o644);
        check!(!NcFile::open(&path).unwrap().has_variable("time_bnds"));
    }

    #[test]
    fn writes_multidimensional_record_variables_in_place() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, Version::Data64);
        let file = NcFile::open(&path).unwrap();
        file.write_f64("tas", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

        let reopened = NcFile::open(&path).unwrap();
        check!(reopened.read_f64("tas").unwrap() == vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // interleaved record variables are left alone
        check!(reopened.read_f64("time").unwrap() == vec![15.5, 45.0, 74.5]);
        check!(reopened.read_f64("time_bnds").unwrap() == vec![0.0, 31.0, 31.0, 59.0, 59.0, 90.0]);
    }

    #[test]
    fn rewrite_to_keeps_trailing_records() {
        let dir = TempDir::new().unwrap();
        let src = write_sample(&dir, Version::Offset64);
        let dst = dir.path().join("tas_Amon_model_historical_r1i1p1_185002-185003.nc");
        NcFile::rewrite_to(&src, &dst, &Edits::new().slice("time", 1)).unwrap();

        let file = NcFile::open(&dst).unwrap();
        check!(file.header().numrecs == 2);
        check!(file.read_f64("time").unwrap() == vec![45.0, 74.5]);
        check!(file.read_f64("time_bnds").unwrap() == vec![31.0, 59.0, 59.0, 90.0]);
        check!(file.read_f64("tas").unwrap() == vec![282.0, 283.0, 284.0, 285.0]);

        check!(NcFile::rewrite_to(&src, &dst, &Edits::new()).is_err());
    }

    #[test]
    fn slicing_a_trailing_dimension_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, Version::Classic);
        let err = NcFile::rewrite(&path, &Edits::new().slice("lat", 1)).unwrap_err();
        let_assert!(Some(NcTimeError::UnsupportedSlice { dimension, variable }) = err.downcast_ref::<NcTimeError>());
        check!(dimension == "lat");
        check!(variable == "tas");
        // the original is left untouched
        check!(NcFile::open(&path).unwrap().read_f64("lat").unwrap() == vec![-45.0, 45.0]);
    }

    #[test]
    fn data_only_updates_happen_in_place() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, Version::Classic);
        let edits = Edits::new().replace_values("time", vec![0.0, 1.0, 2.0]);
        check!(edits.is_data_only());
        NcFile::update(&path, &edits).unwrap();
        check!(NcFile::open(&path).unwrap().read_f64("time").unwrap() == vec![0.0, 1.0, 2.0]);
    }
}
