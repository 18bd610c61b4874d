//! Evaluation domains and the radix-2 NTT.

use super::field::FieldElement;
use crate::errors::EngineFault;

/// Multiplicative subgroup of size `2^k` with its generator and powers.
#[derive(Debug, Clone)]
pub struct EvaluationDomain {
    size: usize,
    omega: FieldElement,
    /// `omega^i` for `i < size`.
    powers: Vec<FieldElement>,
}

impl EvaluationDomain {
    pub fn new(size: u64) -> Result<Self, EngineFault> {
        let omega = FieldElement::root_of_unity(size).ok_or_else(|| {
            EngineFault::Failed(format!(
                "domain size {} is not a power of two up to 2^32",
                size
            ))
        })?;
        let size = usize::try_from(size)
            .map_err(|_| EngineFault::Failed(format!("domain size {} too large", size)))?;

        let mut powers = Vec::with_capacity(size);
        let mut current = FieldElement::ONE;
        for _ in 0..size {
            powers.push(current);
            current = current * omega;
        }

        Ok(Self {
            size,
            omega,
            powers,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn omega(&self) -> FieldElement {
        self.omega
    }

    /// Number of points in the subgroup generated by `omega^stride`.
    ///
    /// `stride` must be a power of two no larger than the domain.
    pub fn subgroup_size(&self, stride: usize) -> Result<usize, EngineFault> {
        if stride == 0 || !stride.is_power_of_two() || stride > self.size {
            return Err(EngineFault::Failed(format!(
                "stride {} does not divide domain of size {}",
                stride, self.size
            )));
        }
        Ok(self.size / stride)
    }

    /// Evaluate over the whole domain (in-place iterative NTT).
    pub fn fft(&self, coeffs: &[FieldElement]) -> Result<Vec<FieldElement>, EngineFault> {
        self.sub_fft(coeffs, 1)
    }

    /// Evaluate `coeffs` over the subgroup generated by `omega^stride`.
    pub fn sub_fft(
        &self,
        coeffs: &[FieldElement],
        stride: usize,
    ) -> Result<Vec<FieldElement>, EngineFault> {
        let n = self.subgroup_size(stride)?;
        if coeffs.len() > n {
            return Err(EngineFault::Failed(format!(
                "{} coefficients exceed subgroup of size {}",
                coeffs.len(),
                n
            )));
        }
        let mut values = coeffs.to_vec();
        values.resize(n, FieldElement::ZERO);

        let bits = n.trailing_zeros();
        if bits > 0 {
            for i in 0..n {
                let j = i.reverse_bits() >> (usize::BITS - bits);
                if i < j {
                    values.swap(i, j);
                }
            }
        }

        let mut len = 2;
        while len <= n {
            let step = (n / len) * stride;
            for start in (0..n).step_by(len) {
                for k in 0..len / 2 {
                    let w = self.powers[k * step];
                    let u = values[start + k];
                    let v = values[start + k + len / 2] * w;
                    values[start + k] = u + v;
                    values[start + k + len / 2] = u - v;
                }
            }
            len <<= 1;
        }
        Ok(values)
    }

    /// Combine strided partial transforms into the evaluations at
    /// `omega^from .. omega^(from+count)`.
    ///
    /// `partials` holds `stride` blocks of `size / stride` values; block `r`
    /// is `sub_fft` of coefficients `r, r + stride, r + 2 * stride, ...`.
    /// Each output costs `stride` multiplications.
    pub fn merge_range(
        &self,
        partials: &[FieldElement],
        stride: usize,
        from: usize,
        count: usize,
    ) -> Result<Vec<FieldElement>, EngineFault> {
        let m = self.subgroup_size(stride)?;
        if partials.len() != self.size {
            return Err(EngineFault::Failed(format!(
                "{} partial values for a domain of size {}",
                partials.len(),
                self.size
            )));
        }
        let end = from
            .checked_add(count)
            .filter(|end| *end <= self.size)
            .ok_or_else(|| {
                EngineFault::Failed(format!(
                    "range {}+{} exceeds domain of size {}",
                    from, count, self.size
                ))
            })?;

        let mask = self.size - 1;
        Ok((from..end)
            .map(|i| {
                let column = i % m;
                (0..stride)
                    .map(|r| self.powers[i.wrapping_mul(r) & mask] * partials[r * m + column])
                    .sum()
            })
            .collect())
    }
}
