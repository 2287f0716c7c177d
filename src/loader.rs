//! Loader: JSON matrix files into validated format models
//!
//! One matrix per file. Every file carries a `format` discriminator plus
//! the arrays and scalars of its layout. Field names follow the external
//! conversion tool: CSC writes `col_ptr`/`row_idx`/`data`, HYB nests an
//! `ELL` object and a `COO_tail` object. Unknown or missing fields are a
//! decode failure, never a partial parse.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use num_traits::ToPrimitive;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::LoadError;
use crate::matrix::{
    CooTail, FormatTag, SparseMatrix, SparseMatrixCOO, SparseMatrixCSC, SparseMatrixCSR,
    SparseMatrixDIA, SparseMatrixELL, SparseMatrixHYB, SpmvKernel,
};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CsrFile {
    format: String,
    row_ptr: Vec<u32>,
    col_ind: Vec<u32>,
    data: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
    nnz: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CooFile {
    format: String,
    row: Vec<u32>,
    col: Vec<u32>,
    data: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
    nnz: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EllFile {
    format: String,
    indices: Vec<u32>,
    values: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
    num_cols_per_row: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HybFile {
    format: String,
    num_rows: usize,
    num_cols: usize,
    #[serde(rename = "ELL")]
    ell: HybEllSection,
    #[serde(rename = "COO_tail")]
    coo_tail: HybTailSection,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HybEllSection {
    indices: Vec<u32>,
    values: Vec<f32>,
    num_cols_per_row: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HybTailSection {
    row: Vec<u32>,
    col: Vec<u32>,
    data: Vec<f32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DiaFile {
    format: String,
    num_rows: usize,
    num_cols: usize,
    num_diagonals: usize,
    values: Vec<f32>,
    offsets: Vec<i64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CscFile {
    format: String,
    num_rows: usize,
    num_cols: usize,
    col_ptr: Vec<u32>,
    row_idx: Vec<u32>,
    data: Vec<f32>,
}

/// Only the discriminator, used to sniff a file's layout
#[derive(Deserialize)]
struct FormatProbe {
    format: String,
}

/// A decoded file that can be turned into a validated model
trait WireMatrix: DeserializeOwned {
    fn format_field(&self) -> &str;
    fn into_matrix(self) -> Result<SparseMatrix, LoadError>;
}

fn declared_nnz(format: FormatTag, declared: usize, actual: usize) -> Result<(), LoadError> {
    if declared != actual {
        return Err(LoadError::shape(
            format,
            format!("nnz field is {}, arrays hold {} entries", declared, actual),
        ));
    }
    Ok(())
}

impl WireMatrix for CsrFile {
    fn format_field(&self) -> &str {
        &self.format
    }

    fn into_matrix(self) -> Result<SparseMatrix, LoadError> {
        declared_nnz(FormatTag::Csr, self.nnz, self.col_ind.len())?;
        SparseMatrixCSR::new(
            self.num_rows,
            self.num_cols,
            self.row_ptr,
            self.col_ind,
            self.data,
        )
        .map(SparseMatrix::from)
    }
}

impl WireMatrix for CooFile {
    fn format_field(&self) -> &str {
        &self.format
    }

    fn into_matrix(self) -> Result<SparseMatrix, LoadError> {
        declared_nnz(FormatTag::Coo, self.nnz, self.data.len())?;
        SparseMatrixCOO::new(self.num_rows, self.num_cols, self.row, self.col, self.data)
            .map(SparseMatrix::from)
    }
}

impl WireMatrix for EllFile {
    fn format_field(&self) -> &str {
        &self.format
    }

    fn into_matrix(self) -> Result<SparseMatrix, LoadError> {
        SparseMatrixELL::new(
            self.num_rows,
            self.num_cols,
            self.num_cols_per_row,
            self.indices,
            self.values,
        )
        .map(SparseMatrix::from)
    }
}

impl WireMatrix for HybFile {
    fn format_field(&self) -> &str {
        &self.format
    }

    fn into_matrix(self) -> Result<SparseMatrix, LoadError> {
        let tail = CooTail {
            row: self.coo_tail.row,
            col: self.coo_tail.col,
            data: self.coo_tail.data,
        };
        SparseMatrixHYB::new(
            self.num_rows,
            self.num_cols,
            self.ell.num_cols_per_row,
            self.ell.indices,
            self.ell.values,
            tail,
        )
        .map(SparseMatrix::from)
    }
}

impl WireMatrix for DiaFile {
    fn format_field(&self) -> &str {
        &self.format
    }

    fn into_matrix(self) -> Result<SparseMatrix, LoadError> {
        let offsets = self
            .offsets
            .iter()
            .map(|&o| {
                o.to_i32().ok_or_else(|| {
                    LoadError::shape(FormatTag::Dia, format!("offset {} does not fit in i32", o))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        SparseMatrixDIA::new(
            self.num_rows,
            self.num_cols,
            self.num_diagonals,
            offsets,
            self.values,
        )
        .map(SparseMatrix::from)
    }
}

impl WireMatrix for CscFile {
    fn format_field(&self) -> &str {
        &self.format
    }

    fn into_matrix(self) -> Result<SparseMatrix, LoadError> {
        SparseMatrixCSC::new(
            self.num_rows,
            self.num_cols,
            self.col_ptr,
            self.row_idx,
            self.data,
        )
        .map(SparseMatrix::from)
    }
}

fn decode_failure(path: &Path, message: impl Into<String>) -> LoadError {
    LoadError::DecodeFailure {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn decode<W: WireMatrix>(
    text: &str,
    expected: FormatTag,
    path: &Path,
) -> Result<SparseMatrix, LoadError> {
    let wire: W = serde_json::from_str(text).map_err(|e| decode_failure(path, e.to_string()))?;

    match wire.format_field().parse::<FormatTag>() {
        Ok(tag) if tag == expected => {}
        Ok(tag) => {
            return Err(decode_failure(
                path,
                format!("file declares format {}, expected {}", tag, expected),
            ))
        }
        Err(e) => return Err(decode_failure(path, e.to_string())),
    }

    wire.into_matrix()
}

/// Parses a matrix of the `expected` layout from JSON text.
///
/// `origin` is only used in error messages.
pub fn parse_matrix(
    text: &str,
    expected: FormatTag,
    origin: &Path,
) -> Result<SparseMatrix, LoadError> {
    let matrix = match expected {
        FormatTag::Csr => decode::<CsrFile>(text, expected, origin),
        FormatTag::Coo => decode::<CooFile>(text, expected, origin),
        FormatTag::Ell => decode::<EllFile>(text, expected, origin),
        FormatTag::Hyb => decode::<HybFile>(text, expected, origin),
        FormatTag::Dia => decode::<DiaFile>(text, expected, origin),
        FormatTag::Csc => decode::<CscFile>(text, expected, origin),
    }?;

    debug!(
        "decoded {} matrix from {}: {} x {}, {} threads",
        expected,
        origin.display(),
        matrix.n_rows(),
        matrix.n_cols(),
        matrix.thread_count()
    );
    Ok(matrix)
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::FileUnreadable {
        path: PathBuf::from(path),
        source,
    })
}

/// Loads a matrix file that must hold the `expected` layout
pub fn load_matrix(path: impl AsRef<Path>, expected: FormatTag) -> Result<SparseMatrix, LoadError> {
    let path = path.as_ref();
    let text = read(path)?;
    let matrix = parse_matrix(&text, expected, path)?;
    info!("loaded {} matrix {}", expected, path.display());
    Ok(matrix)
}

/// Reads the `format` discriminator of a matrix file without decoding the arrays
pub fn detect_format(path: impl AsRef<Path>) -> Result<FormatTag, LoadError> {
    let path = path.as_ref();
    let text = read(path)?;
    let probe: FormatProbe =
        serde_json::from_str(&text).map_err(|e| decode_failure(path, e.to_string()))?;
    probe
        .format
        .parse()
        .map_err(|e: crate::matrix::ParseFormatError| decode_failure(path, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> &'static Path {
        Path::new("<test>")
    }

    #[test]
    fn test_parse_csr() {
        let text = r#"{"format":"CSR","row_ptr":[0,1,2,3],"col_ind":[0,1,2],
            "data":[1,1,1],"num_rows":3,"num_cols":3,"nnz":3}"#;
        let matrix = parse_matrix(text, FormatTag::Csr, origin()).unwrap();

        assert_eq!(matrix.format(), FormatTag::Csr);
        assert_eq!(matrix.n_rows(), 3);
    }

    #[test]
    fn test_parse_hyb_sections() {
        let text = r#"{"format":"HYB","num_rows":2,"num_cols":2,
            "ELL":{"indices":[0,1],"values":[1.0,2.0],"num_cols_per_row":1},
            "COO_tail":{"row":[0],"col":[1],"data":[3.0]}}"#;
        let matrix = parse_matrix(text, FormatTag::Hyb, origin()).unwrap();

        match matrix {
            SparseMatrix::Hyb(hyb) => assert_eq!(hyb.tail_len(), 1),
            other => panic!("expected HYB, got {:?}", other.format()),
        }
    }

    #[test]
    fn test_parse_csc_field_names() {
        let text = r#"{"format":"CSC","num_rows":2,"num_cols":1,
            "col_ptr":[0,2],"row_idx":[0,1],"data":[1.0,2.0]}"#;
        let matrix = parse_matrix(text, FormatTag::Csc, origin()).unwrap();
        assert_eq!(matrix.thread_count(), 1);
    }

    #[test]
    fn test_negative_dia_offsets() {
        let text = r#"{"format":"DIA","num_rows":2,"num_cols":2,"num_diagonals":1,
            "values":[0.0,1.0],"offsets":[-1]}"#;
        assert!(parse_matrix(text, FormatTag::Dia, origin()).is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = r#"{"format":"COO","row":[0],"col":[0],"data":[1.0],
            "num_rows":1,"num_cols":1,"nnz":1,"extra":true}"#;
        let err = parse_matrix(text, FormatTag::Coo, origin()).unwrap_err();
        assert!(matches!(err, LoadError::DecodeFailure { .. }));
    }

    #[test]
    fn test_missing_field_rejected() {
        let text = r#"{"format":"ELL","indices":[0],"values":[1.0],"num_rows":1,"num_cols":1}"#;
        let err = parse_matrix(text, FormatTag::Ell, origin()).unwrap_err();
        assert!(matches!(err, LoadError::DecodeFailure { .. }));
    }

    #[test]
    fn test_format_mismatch_rejected() {
        let text = r#"{"format":"CSC","row_ptr":[0,1],"col_ind":[0],
            "data":[1.0],"num_rows":1,"num_cols":1,"nnz":1}"#;
        let err = parse_matrix(text, FormatTag::Csr, origin()).unwrap_err();
        assert!(err.to_string().contains("declares format CSC"));
    }

    #[test]
    fn test_declared_nnz_mismatch() {
        let text = r#"{"format":"CSR","row_ptr":[0,1],"col_ind":[0],
            "data":[1.0],"num_rows":1,"num_cols":1,"nnz":2}"#;
        let err = parse_matrix(text, FormatTag::Csr, origin()).unwrap_err();
        assert!(matches!(err, LoadError::ShapeInvalid { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_matrix("/nonexistent/matrix_csr.json", FormatTag::Csr).unwrap_err();
        assert!(matches!(err, LoadError::FileUnreadable { .. }));
    }
}
