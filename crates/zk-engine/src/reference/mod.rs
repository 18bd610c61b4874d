//! # Reference Engine
//!
//! A concrete engine image over the Goldilocks field, so pools can be run end
//! to end without a native library. Group elements ("points") are field
//! elements under addition; scalars and coefficients are field elements. All
//! of them travel as packed 8-byte little-endian words in the arena.
//!
//! ## Operations
//!
//! | Operation | Arguments | Result |
//! |-----------|-----------|--------|
//! | `new_pippenger` | points_addr, num_points | handle |
//! | `pippenger_unsafe` | handle, scalars_addr, from, range | point bytes |
//! | `new_evaluation_domain` | size | handle |
//! | `fft_partial` | domain, coeffs_addr, stride | sub-transform bytes |
//! | `fft_merge_range` | domain, partials_addr, stride, from, count | evaluation bytes |
//! | `fft` | domain, coeffs_addr | evaluation bytes |
//! | `get_exact_circuit_size` | cs_addr, cs_len | gate count |
//!
//! `pippenger_unsafe` reads `range` scalars at `scalars_addr` and pairs them
//! with points `from..from + range` of the loaded table.
//!
//! A domain of size `n` can be transformed in two rounds. `fft_partial` reads
//! `n / stride` coefficients (every `stride`-th one, starting at some residue)
//! and returns their transform over the subgroup of order `n / stride`.
//! `fft_merge_range` reads all `stride` of those blocks, concatenated in
//! residue order, and returns evaluations `from..from + count` of the full
//! transform.

pub mod fft;
pub mod field;
pub mod msm;

use crate::arena::MemoryArena;
use crate::engine::{Args, Engine, EngineFactory};
use crate::errors::EngineFault;
use fft::EvaluationDomain;
use field::{decode_elements, encode_elements, FieldElement, ELEMENT_BYTES};
use std::collections::HashMap;
use tracing::debug;
use zk_types::Value;

pub const NEW_PIPPENGER_OP: &str = "new_pippenger";
pub const PIPPENGER_UNSAFE_OP: &str = "pippenger_unsafe";
pub const NEW_EVALUATION_DOMAIN_OP: &str = "new_evaluation_domain";
pub const FFT_PARTIAL_OP: &str = "fft_partial";
pub const FFT_MERGE_RANGE_OP: &str = "fft_merge_range";
pub const FFT_OP: &str = "fft";
pub const GET_EXACT_CIRCUIT_SIZE_OP: &str = "get_exact_circuit_size";

/// Size of the gate-count header at the start of a serialized constraint
/// system.
pub const CIRCUIT_HEADER_BYTES: u64 = 4;

/// Engine image producing [`ReferenceEngine`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceImage;

impl EngineFactory for ReferenceImage {
    fn name(&self) -> &str {
        "reference-goldilocks"
    }

    fn instantiate(&self, slot: usize) -> Result<Box<dyn Engine>, EngineFault> {
        debug!(slot = slot, "Instantiating reference engine");
        Ok(Box::new(ReferenceEngine::new()))
    }
}

/// Engine state: loaded point tables and evaluation domains by handle.
#[derive(Debug, Default)]
pub struct ReferenceEngine {
    next_handle: u64,
    point_tables: HashMap<u64, Vec<FieldElement>>,
    domains: HashMap<u64, EvaluationDomain>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    fn issue_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn read_elements(
        op: &str,
        arena: &MemoryArena,
        addr: u64,
        count: u64,
    ) -> Result<Vec<FieldElement>, EngineFault> {
        let len = count
            .checked_mul(ELEMENT_BYTES as u64)
            .ok_or_else(|| EngineFault::Failed(format!("{}: element count {} overflows", op, count)))?;
        let bytes = arena.read(addr, len)?;
        decode_elements(bytes)
            .ok_or_else(|| EngineFault::Failed(format!("{}: non-canonical field element", op)))
    }

    fn domain(&self, handle: u64) -> Result<&EvaluationDomain, EngineFault> {
        self.domains
            .get(&handle)
            .ok_or(EngineFault::InvalidHandle(handle))
    }

    fn new_pippenger(&mut self, args: &Args<'_>, arena: &MemoryArena) -> Result<Value, EngineFault> {
        let points = Self::read_elements(NEW_PIPPENGER_OP, arena, args.number(0)?, args.number(1)?)?;
        let handle = self.issue_handle();
        debug!(handle = handle, points = points.len(), "Point table loaded");
        self.point_tables.insert(handle, points);
        Ok(Value::Number(handle))
    }

    fn pippenger_unsafe(&self, args: &Args<'_>, arena: &MemoryArena) -> Result<Value, EngineFault> {
        let handle = args.number(0)?;
        let table = self
            .point_tables
            .get(&handle)
            .ok_or(EngineFault::InvalidHandle(handle))?;
        let from = args.number(2)?;
        let range = args.number(3)?;

        let points = from
            .checked_add(range)
            .filter(|end| *end <= table.len() as u64)
            .map(|end| &table[from as usize..end as usize])
            .ok_or_else(|| {
                EngineFault::Failed(format!(
                    "points {}+{} exceed table of {}",
                    from,
                    range,
                    table.len()
                ))
            })?;
        let scalars = Self::read_elements(PIPPENGER_UNSAFE_OP, arena, args.number(1)?, range)?;

        let result = msm::pippenger(points, &scalars);
        Ok(Value::Bytes(result.to_le_bytes().to_vec()))
    }

    fn index(op: &str, what: &str, value: u64) -> Result<usize, EngineFault> {
        usize::try_from(value)
            .map_err(|_| EngineFault::Failed(format!("{}: {} {} too large", op, what, value)))
    }

    fn fft_partial(&self, args: &Args<'_>, arena: &MemoryArena) -> Result<Value, EngineFault> {
        let domain = self.domain(args.number(0)?)?;
        let stride = Self::index(FFT_PARTIAL_OP, "stride", args.number(2)?)?;
        let len = domain.subgroup_size(stride)?;
        let coeffs = Self::read_elements(FFT_PARTIAL_OP, arena, args.number(1)?, len as u64)?;
        Ok(Value::Bytes(encode_elements(&domain.sub_fft(&coeffs, stride)?)))
    }

    fn fft_merge_range(&self, args: &Args<'_>, arena: &MemoryArena) -> Result<Value, EngineFault> {
        let domain = self.domain(args.number(0)?)?;
        let partials =
            Self::read_elements(FFT_MERGE_RANGE_OP, arena, args.number(1)?, domain.size() as u64)?;
        let stride = Self::index(FFT_MERGE_RANGE_OP, "stride", args.number(2)?)?;
        let from = Self::index(FFT_MERGE_RANGE_OP, "offset", args.number(3)?)?;
        let count = Self::index(FFT_MERGE_RANGE_OP, "count", args.number(4)?)?;

        let values = domain.merge_range(&partials, stride, from, count)?;
        Ok(Value::Bytes(encode_elements(&values)))
    }

    fn fft(&self, args: &Args<'_>, arena: &MemoryArena) -> Result<Value, EngineFault> {
        let domain = self.domain(args.number(0)?)?;
        let coeffs = Self::read_elements(FFT_OP, arena, args.number(1)?, domain.size() as u64)?;
        Ok(Value::Bytes(encode_elements(&domain.fft(&coeffs)?)))
    }

    fn circuit_size(args: &Args<'_>, arena: &MemoryArena) -> Result<Value, EngineFault> {
        let len = args.number(1)?;
        if len < CIRCUIT_HEADER_BYTES {
            return Err(EngineFault::Failed(format!(
                "constraint system of {} bytes has no header",
                len
            )));
        }
        let header = arena.read(args.number(0)?, CIRCUIT_HEADER_BYTES)?;
        let mut gates = [0u8; 4];
        gates.copy_from_slice(header);
        Ok(Value::Number(u32::from_le_bytes(gates) as u64))
    }
}

impl Engine for ReferenceEngine {
    fn name(&self) -> &str {
        "reference-goldilocks"
    }

    fn call(
        &mut self,
        op: &str,
        args: &[Value],
        arena: &mut MemoryArena,
    ) -> Result<Value, EngineFault> {
        match op {
            NEW_PIPPENGER_OP => self.new_pippenger(&Args::new(op, args, 2)?, arena),
            PIPPENGER_UNSAFE_OP => self.pippenger_unsafe(&Args::new(op, args, 4)?, arena),
            NEW_EVALUATION_DOMAIN_OP => {
                let domain = EvaluationDomain::new(Args::new(op, args, 1)?.number(0)?)?;
                let handle = self.issue_handle();
                self.domains.insert(handle, domain);
                Ok(Value::Number(handle))
            }
            FFT_PARTIAL_OP => self.fft_partial(&Args::new(op, args, 3)?, arena),
            FFT_MERGE_RANGE_OP => self.fft_merge_range(&Args::new(op, args, 5)?, arena),
            FFT_OP => self.fft(&Args::new(op, args, 2)?, arena),
            GET_EXACT_CIRCUIT_SIZE_OP => Self::circuit_size(&Args::new(op, args, 2)?, arena),
            _ => Err(EngineFault::UnknownOperation(op.to_string())),
        }
    }
}
