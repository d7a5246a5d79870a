//! Matrix product as a fan-out join.
//!
//! Element `(i, j)` of the left operand is copied to every output cell
//! `(i, k)` for `k` in `[0, right_cols)`, and element `(j, k)` of the right
//! operand to every cell `(i, k)` for `i` in `[0, left_rows)`. Each cell's
//! group then holds one row of the left operand and one column of the right
//! one. Map output grows with the output dimension of each element, which is
//! what dominates the cost of this job.
//!
//! Pairing is positional after sorting each side by `j`, so both operands must
//! be dense. Sparse input with matching counts is caught as a join index
//! mismatch rather than silently summed.

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::common::{Combiner, Mapper, Reducer};
use crate::configuration::MatrixSettings;
use crate::error::{MalformedRecord, MrError};
use crate::pipeline::Pipeline;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Left,
    Right,
}

/// One `<matrix> <row> <col> <value>` input tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixElement {
    pub matrix: String,
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl MatrixElement {
    pub fn parse(line: &str) -> Result<Self, MalformedRecord> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [matrix, row, col, value] = fields.as_slice() else {
            return Err(MalformedRecord::new(format!(
                "expected 4 fields, got {}",
                fields.len()
            )));
        };
        let index = |field: &str| {
            field
                .parse::<usize>()
                .map_err(|e| MalformedRecord::new(format!("bad index {field:?}: {e}")))
        };
        let parsed = value
            .parse::<f64>()
            .map_err(|e| MalformedRecord::new(format!("bad value {value:?}: {e}")))?;
        if !parsed.is_finite() {
            return Err(MalformedRecord::new(format!("non-finite value {value:?}")));
        }
        Ok(Self {
            matrix: matrix.to_string(),
            row: index(*row)?,
            col: index(*col)?,
            value: parsed,
        })
    }
}

/// One operand's element, tagged with its side and join index `j`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub operand: Operand,
    pub join: usize,
    pub value: f64,
}

/// Contributions for one cell, bundled so a combiner can merge them without
/// reducing them.
pub type Bundle = Vec<Contribution>;

pub struct MatrixMapper {
    settings: Arc<MatrixSettings>,
}

impl MatrixMapper {
    pub fn new(settings: Arc<MatrixSettings>) -> Self {
        Self { settings }
    }
}

impl Mapper for MatrixMapper {
    type In = String;
    type Key = Cell;
    type Value = Bundle;

    fn map(&self, line: String) -> Result<Vec<(Cell, Bundle)>, MalformedRecord> {
        let element = MatrixElement::parse(&line)?;

        if element.matrix == self.settings.left {
            let contribution = Contribution {
                operand: Operand::Left,
                join: element.col,
                value: element.value,
            };
            Ok((0..self.settings.right_cols)
                .map(|col| {
                    (
                        Cell {
                            row: element.row,
                            col,
                        },
                        vec![contribution],
                    )
                })
                .collect())
        } else if element.matrix == self.settings.right {
            let contribution = Contribution {
                operand: Operand::Right,
                join: element.row,
                value: element.value,
            };
            Ok((0..self.settings.left_rows)
                .map(|row| {
                    (
                        Cell {
                            row,
                            col: element.col,
                        },
                        vec![contribution],
                    )
                })
                .collect())
        } else {
            Err(MalformedRecord::new(format!(
                "unknown matrix {:?}",
                element.matrix
            )))
        }
    }
}

/// Concatenates a partition's bundles for a cell into one bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleCombiner;

impl Combiner<Cell, Bundle> for BundleCombiner {
    fn combine(&self, _cell: &Cell, bundles: Vec<Bundle>) -> Bundle {
        bundles.into_iter().flatten().collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixReducer;

impl Reducer for MatrixReducer {
    type Key = Cell;
    type Value = Bundle;
    type OutKey = Cell;
    type OutValue = f64;

    fn reduce(&self, cell: Cell, bundles: Vec<Bundle>) -> Result<Vec<(Cell, f64)>, MrError> {
        let (mut left, mut right): (Vec<Contribution>, Vec<Contribution>) = bundles
            .into_iter()
            .flatten()
            .partition(|c| c.operand == Operand::Left);

        if left.len() != right.len() {
            return Err(MrError::JoinLengthMismatch {
                key: cell.to_string(),
                left: left.len(),
                right: right.len(),
            });
        }

        // Arrival order across partitions is arbitrary.
        left.sort_by_key(|c| c.join);
        right.sort_by_key(|c| c.join);

        let mut sum = 0.0;
        for (l, r) in left.iter().zip(&right) {
            if l.join != r.join {
                return Err(MrError::JoinIndexMismatch {
                    key: cell.to_string(),
                    left: l.join,
                    right: r.join,
                });
            }
            sum += l.value * r.value;
        }

        Ok(vec![(cell, sum)])
    }
}

pub type MatrixStep = Step<MatrixMapper, BundleCombiner, MatrixReducer>;

/// Single-step job computing `left × right` from element tuples of both
/// operands.
pub fn matrix_product(
    settings: MatrixSettings,
) -> Result<Pipeline<MatrixStep, String, (Cell, f64)>, MrError> {
    if settings.left_rows == 0 || settings.right_cols == 0 {
        return Err(MrError::InvalidConfig(
            "matrix output dimensions must be set".into(),
        ));
    }
    if settings.left == settings.right {
        return Err(MrError::InvalidConfig(
            "left and right matrix names must differ".into(),
        ));
    }
    let step = Step::new(MatrixMapper::new(Arc::new(settings)), MatrixReducer)
        .with_combiner(BundleCombiner);
    Ok(Pipeline::new(step))
}

/// `[<row>, <col>]<TAB><value>`
pub fn format_cell(cell: &Cell, value: f64) -> String {
    format!("{cell}\t{value}")
}

/// Reads back a line written by [`format_cell`].
pub fn parse_cell(line: &str) -> anyhow::Result<(Cell, f64)> {
    let (cell, value) = line
        .split_once('\t')
        .with_context(|| format!("Missing tab in {line:?}"))?;
    let (row, col) = cell
        .trim()
        .strip_prefix('[')
        .and_then(|c| c.strip_suffix(']'))
        .and_then(|c| c.split_once(','))
        .with_context(|| format!("Bad cell {cell:?}"))?;
    let cell = Cell {
        row: row.trim().parse().with_context(|| format!("Bad row in {line:?}"))?,
        col: col.trim().parse().with_context(|| format!("Bad column in {line:?}"))?,
    };
    let value = value
        .trim()
        .parse()
        .with_context(|| format!("Bad value in {line:?}"))?;
    Ok((cell, value))
}

/// Encodes a dense matrix as `<name> <row> <col> <value>` lines.
pub fn dense_tuples(name: &str, rows: &[Vec<f64>]) -> Vec<String> {
    rows.iter()
        .enumerate()
        .flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(move |(j, value)| format!("{name} {i} {j} {value}"))
        })
        .collect()
}

/// Parses whitespace-separated rows of a dense matrix.
pub fn parse_dense(text: &str) -> anyhow::Result<Vec<Vec<f64>>> {
    let rows = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            line.split_whitespace()
                .map(|v| {
                    v.parse::<f64>()
                        .with_context(|| format!("Bad value {v:?} on row {i}"))
                })
                .collect::<anyhow::Result<Vec<f64>>>()
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if let Some(first) = rows.first() {
        if let Some(i) = rows.iter().position(|r| r.len() != first.len()) {
            bail!("Row {i} has {} columns, expected {}", rows[i].len(), first.len());
        }
    }
    Ok(rows)
}

/// Checks job output against a direct product of the dense operands. Every
/// cell of the product must be present exactly once and within `tolerance`.
pub fn check_product(
    left: &[Vec<f64>],
    right: &[Vec<f64>],
    output: &[(Cell, f64)],
    tolerance: f64,
) -> anyhow::Result<()> {
    let inner = right.len();
    let cols = right.first().map_or(0, Vec::len);
    if left.iter().any(|row| row.len() != inner) {
        bail!("Operands do not share an inner dimension of {inner}");
    }
    if let Some(i) = right.iter().position(|row| row.len() != cols) {
        bail!("Right operand row {i} has {} columns, expected {cols}", right[i].len());
    }

    let mut seen = vec![vec![false; cols]; left.len()];
    for (cell, value) in output {
        if cell.row >= left.len() || cell.col >= cols {
            bail!("Cell {cell} is outside the product");
        }
        let expected: f64 = (0..inner)
            .map(|j| left[cell.row][j] * right[j][cell.col])
            .sum();
        if seen[cell.row][cell.col] {
            bail!("Cell {cell} appears twice");
        }
        seen[cell.row][cell.col] = true;
        if (value - expected).abs() > tolerance {
            bail!("Cell {cell} is {value}, expected {expected}");
        }
    }

    if let Some(row) = seen.iter().position(|r| r.iter().any(|s| !s)) {
        bail!("Row {row} of the product is incomplete");
    }
    Ok(())
}
