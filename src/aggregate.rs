use crate::error::{IndexError, Result};

/// Element-wise arithmetic mean of equal-dimension vectors.
///
/// A single vector is handed back untouched. The mean is not renormalized.
pub fn mean_embedding(vectors: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    let mut iter = vectors.into_iter();
    let first = iter.next().ok_or(IndexError::EmptyInput)?;
    let dimension = first.len();

    let mut rest = iter.peekable();
    if rest.peek().is_none() {
        return Ok(first);
    }

    let mut count = 1usize;
    let mut sum: Vec<f64> = first.iter().map(|&v| f64::from(v)).collect();

    for vector in rest {
        if vector.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += f64::from(value);
        }
        count += 1;
    }

    let count = count as f64;
    Ok(sum.into_iter().map(|acc| (acc / count) as f32).collect())
}
