//! Immutable change-matrix result model
//!
//! The sole externally-serializable artifact of a computation: the full
//! domain cross product of class-pair elements, sorted ascending by
//! (reference, current) label, plus raster/period metadata and derived
//! per-class marginal totals.

use serde::Serialize;

use gridshift_core::{Error, Result};

use crate::accumulator::ChangeMatrixAccumulator;
use crate::domain::ClassDomain;

/// One cell of the change matrix.
///
/// `area` is `None` when the producing backend performs no area
/// accounting (the device path); zero-count pairs are real elements, so
/// "observed zero transitions" and "pair not in the domain" stay
/// distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMatrixElement {
    pub ref_class: u16,
    pub cur_class: u16,
    pub pixel_count: u64,
    pub area: Option<f64>,
}

/// Identification metadata carried on a result
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixMetadata {
    /// Name of the raster/job the matrix was computed for
    pub raster_name: String,
    /// Label of the reference (earlier) period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_period: Option<String>,
    /// Label of the current (later) period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur_period: Option<String>,
}

/// Per-class marginal totals derived from the matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTotal {
    pub class: u16,
    pub pixel_count: u64,
    pub area: Option<f64>,
}

/// The finalized change matrix.
///
/// Always contains exactly |domain|² elements in ascending
/// (ref_class, cur_class) order. Construction enumerates the sorted
/// domain cross product, so ordering holds by construction and duplicate
/// keys cannot exist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeMatrixResult {
    #[serde(flatten)]
    metadata: MatrixMetadata,
    #[serde(skip)]
    domain: ClassDomain,
    change_matrix: Vec<ChangeMatrixElement>,
}

impl ChangeMatrixResult {
    /// Build the result from a frozen accumulator.
    ///
    /// Fails with [`Error::IllegalState`] when the accumulator has not
    /// been frozen (reading a live accumulator is a sequencing bug).
    pub fn from_accumulator(
        accumulator: &ChangeMatrixAccumulator,
        metadata: MatrixMetadata,
    ) -> Result<Self> {
        if !accumulator.is_frozen() {
            return Err(Error::IllegalState(
                "change-matrix result requires a frozen accumulator",
            ));
        }

        let domain = accumulator.domain().clone();
        let mut change_matrix = Vec::with_capacity(domain.len() * domain.len());
        for ref_class in domain.iter() {
            for cur_class in domain.iter() {
                change_matrix.push(ChangeMatrixElement {
                    ref_class,
                    cur_class,
                    pixel_count: accumulator.pair_count(ref_class, cur_class)?,
                    area: Some(accumulator.pair_area(ref_class, cur_class)?),
                });
            }
        }

        Ok(Self {
            metadata,
            domain,
            change_matrix,
        })
    }

    /// Build the result from a dense `class_count` x `class_count` pixel
    /// count matrix indexed `ref + cur * class_count`, where dense index
    /// 0 is the reserved no-data class and index `i >= 1` is the domain
    /// label at position `i - 1`.
    ///
    /// Only domain pairs are emitted: the no-data row/column the dense
    /// buffer necessarily carries is excluded from the result, not
    /// zero-valued. Elements carry no area (the device path counts
    /// pixels only).
    pub fn from_dense(
        matrix: &[u64],
        class_count: usize,
        domain: &ClassDomain,
        metadata: MatrixMetadata,
    ) -> Result<Self> {
        if matrix.len() != class_count * class_count {
            return Err(Error::InvalidDimensions {
                width: class_count,
                height: class_count,
            });
        }
        if class_count != domain.len() + 1 {
            return Err(Error::InvalidParameter {
                name: "class_count",
                value: class_count.to_string(),
                reason: format!(
                    "dense matrix must cover the domain plus the reserved class \
                     ({} + 1)",
                    domain.len()
                ),
            });
        }

        let mut change_matrix = Vec::with_capacity(domain.len() * domain.len());
        for (ref_idx, ref_class) in domain.iter().enumerate() {
            for (cur_idx, cur_class) in domain.iter().enumerate() {
                let dense = (ref_idx + 1) + (cur_idx + 1) * class_count;
                change_matrix.push(ChangeMatrixElement {
                    ref_class,
                    cur_class,
                    pixel_count: matrix[dense],
                    area: None,
                });
            }
        }

        Ok(Self {
            metadata,
            domain: domain.clone(),
            change_matrix,
        })
    }

    /// Result metadata
    pub fn metadata(&self) -> &MatrixMetadata {
        &self.metadata
    }

    /// The class domain the matrix covers
    pub fn domain(&self) -> &ClassDomain {
        &self.domain
    }

    /// All elements, ascending by (ref_class, cur_class)
    pub fn elements(&self) -> &[ChangeMatrixElement] {
        &self.change_matrix
    }

    /// Element for a specific pair, if both labels are in the domain
    pub fn pair(&self, ref_class: u16, cur_class: u16) -> Option<&ChangeMatrixElement> {
        let n = self.domain.len();
        let ref_idx = self.domain.index_of(ref_class)?;
        let cur_idx = self.domain.index_of(cur_class)?;
        self.change_matrix.get(ref_idx * n + cur_idx)
    }

    /// Sum of all pair pixel counts
    pub fn total_pixels(&self) -> u64 {
        self.change_matrix.iter().map(|e| e.pixel_count).sum()
    }

    /// Per-class totals over the reference period (matrix row sums)
    pub fn reference_totals(&self) -> Vec<ClassTotal> {
        self.marginals(|e| e.ref_class)
    }

    /// Per-class totals over the current period (matrix column sums)
    pub fn current_totals(&self) -> Vec<ClassTotal> {
        self.marginals(|e| e.cur_class)
    }

    fn marginals(&self, key: impl Fn(&ChangeMatrixElement) -> u16) -> Vec<ClassTotal> {
        self.domain
            .iter()
            .map(|class| {
                let mut pixel_count = 0u64;
                let mut area_sum = 0.0f64;
                let mut has_area = false;
                for e in self.change_matrix.iter().filter(|e| key(e) == class) {
                    pixel_count += e.pixel_count;
                    if let Some(a) = e.area {
                        area_sum += a;
                        has_area = true;
                    }
                }
                ClassTotal {
                    class,
                    pixel_count,
                    area: has_area.then_some(area_sum),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frozen_accumulator() -> ChangeMatrixAccumulator {
        let acc = ChangeMatrixAccumulator::new(ClassDomain::new([1, 2]).unwrap());
        acc.increment(1, 1, 1.0).unwrap();
        acc.increment(1, 2, 1.0).unwrap();
        acc.increment(1, 2, 1.0).unwrap();
        acc.freeze().unwrap();
        acc
    }

    #[test]
    fn test_complete_cross_product() {
        let result =
            ChangeMatrixResult::from_accumulator(&frozen_accumulator(), MatrixMetadata::default())
                .unwrap();
        assert_eq!(result.elements().len(), 4);

        let keys: Vec<(u16, u16)> = result
            .elements()
            .iter()
            .map(|e| (e.ref_class, e.cur_class))
            .collect();
        assert_eq!(keys, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_rejects_live_accumulator() {
        let acc = ChangeMatrixAccumulator::new(ClassDomain::new([1]).unwrap());
        assert!(matches!(
            ChangeMatrixResult::from_accumulator(&acc, MatrixMetadata::default()),
            Err(Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_pair_lookup_and_totals() {
        let result =
            ChangeMatrixResult::from_accumulator(&frozen_accumulator(), MatrixMetadata::default())
                .unwrap();

        assert_eq!(result.pair(1, 2).unwrap().pixel_count, 2);
        assert_eq!(result.pair(2, 2).unwrap().pixel_count, 0);
        assert!(result.pair(1, 9).is_none());
        assert_eq!(result.total_pixels(), 3);

        let ref_totals = result.reference_totals();
        assert_eq!(ref_totals[0].pixel_count, 3, "class 1 row sum");
        assert_eq!(ref_totals[1].pixel_count, 0, "class 2 row sum");

        let cur_totals = result.current_totals();
        assert_eq!(cur_totals[0].pixel_count, 1, "class 1 column sum");
        assert_eq!(cur_totals[1].pixel_count, 2, "class 2 column sum");
    }

    #[test]
    fn test_from_dense_excludes_reserved_class() {
        let domain = ClassDomain::new([1, 2]).unwrap();
        // class_count = 3 (reserved 0 + two labels), index = ref + cur*3.
        let mut dense = vec![0u64; 9];
        dense[1 + 1 * 3] = 5; // (1, 1)
        dense[1 + 2 * 3] = 2; // (1, 2)
        dense[0] = 99; // (0, 0): must not leak into the result
        dense[1] = 7; // (1, 0): nor this

        let result =
            ChangeMatrixResult::from_dense(&dense, 3, &domain, MatrixMetadata::default()).unwrap();
        assert_eq!(result.elements().len(), 4);
        assert_eq!(result.pair(1, 1).unwrap().pixel_count, 5);
        assert_eq!(result.pair(1, 2).unwrap().pixel_count, 2);
        assert_eq!(result.total_pixels(), 7);
        assert!(result.elements().iter().all(|e| e.area.is_none()));
    }

    #[test]
    fn test_from_dense_validates_shape() {
        let domain = ClassDomain::new([1]).unwrap();
        assert!(ChangeMatrixResult::from_dense(&[0; 3], 2, &domain, MatrixMetadata::default())
            .is_err());
        assert!(ChangeMatrixResult::from_dense(&[0; 9], 3, &domain, MatrixMetadata::default())
            .is_err());
    }

    #[test]
    fn test_serialized_document_shape() {
        let metadata = MatrixMetadata {
            raster_name: "landcover".into(),
            ref_period: Some("2018".into()),
            cur_period: Some("2024".into()),
        };
        let result =
            ChangeMatrixResult::from_accumulator(&frozen_accumulator(), metadata).unwrap();
        let doc = serde_json::to_value(&result).unwrap();

        assert_eq!(doc["rasterName"], "landcover");
        assert_eq!(doc["refPeriod"], "2018");
        assert_eq!(doc["changeMatrix"].as_array().unwrap().len(), 4);
        assert_eq!(doc["changeMatrix"][1]["refClass"], 1);
        assert_eq!(doc["changeMatrix"][1]["curClass"], 2);
        assert_eq!(doc["changeMatrix"][1]["pixelCount"], 2);
    }
}
