//! Slice generation and reconstruction over GF(2)
//!
//! An object is padded into equal-sized source blocks. Each slice XORs a
//! random non-empty subset of blocks and records the subset as its
//! coefficient vector. Reconstruction is Gaussian elimination over GF(2):
//! any collection of slices whose coefficient vectors span the block space
//! recovers the object; fewer leave it unrecoverable.

use rand::Rng;

use super::Slice;

#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    #[error("an object must span at least one source block")]
    NoBlocks,
    #[error("not enough independent slices to reconstruct (rank {rank}, need {need})")]
    InsufficientSlices { rank: usize, need: usize },
    #[error("slice has {got} coefficients, expected one per source block ({expected})")]
    CoefficientMismatch { got: usize, expected: usize },
    #[error("slice symbol is {got} bytes, expected {expected}")]
    SymbolLengthMismatch { got: usize, expected: usize },
    #[error("object length {length} does not fit in {num_blocks} blocks of {block_size} bytes")]
    LengthOutOfRange {
        length: u64,
        num_blocks: usize,
        block_size: usize,
    },
}

/// Split `data` into `num_blocks` source blocks and emit `count` random
/// linear combinations of them
///
/// Each slice's coefficient subset is sampled uniformly from the non-empty
/// subsets, so roughly `num_blocks` slices already have a fair chance of
/// spanning the space and a modest surplus makes reconstruction
/// overwhelmingly likely.
pub fn generate_slices<R: Rng>(
    data: &[u8],
    num_blocks: usize,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Slice>, SliceError> {
    if num_blocks == 0 {
        return Err(SliceError::NoBlocks);
    }

    let block_size = data.len().div_ceil(num_blocks).max(1);
    let mut padded = data.to_vec();
    padded.resize(block_size * num_blocks, 0);
    let blocks: Vec<&[u8]> = padded.chunks(block_size).collect();

    let mut slices = Vec::with_capacity(count);
    for _ in 0..count {
        let mut coefficients: Vec<bool> = (0..num_blocks).map(|_| rng.gen()).collect();
        if coefficients.iter().all(|c| !c) {
            // the empty combination carries no information
            coefficients[rng.gen_range(0..num_blocks)] = true;
        }

        let mut symbol = vec![0u8; block_size];
        for (block, selected) in blocks.iter().zip(&coefficients) {
            if *selected {
                xor_into(&mut symbol, block);
            }
        }
        slices.push(Slice::new(coefficients, symbol));
    }
    Ok(slices)
}

/// Recover the original `length` bytes of an object from its slices
///
/// Succeeds for any subset of slices whose coefficient vectors have full
/// rank over the `num_blocks` source blocks; extra or duplicate slices are
/// harmless. Fails with [`SliceError::InsufficientSlices`] otherwise.
pub fn reconstruct(
    slices: &[Slice],
    num_blocks: usize,
    length: u64,
) -> Result<Vec<u8>, SliceError> {
    if num_blocks == 0 {
        return Err(SliceError::NoBlocks);
    }
    let Some(first) = slices.first() else {
        return Err(SliceError::InsufficientSlices {
            rank: 0,
            need: num_blocks,
        });
    };
    let block_size = first.symbol().len();
    if (length as u128) > (block_size as u128 * num_blocks as u128) {
        return Err(SliceError::LengthOutOfRange {
            length,
            num_blocks,
            block_size,
        });
    }

    // forward elimination: keep one pivot row per leading column
    let mut pivots: Vec<Option<(Vec<bool>, Vec<u8>)>> = vec![None; num_blocks];
    for slice in slices {
        if slice.coefficients().len() != num_blocks {
            return Err(SliceError::CoefficientMismatch {
                got: slice.coefficients().len(),
                expected: num_blocks,
            });
        }
        if slice.symbol().len() != block_size {
            return Err(SliceError::SymbolLengthMismatch {
                got: slice.symbol().len(),
                expected: block_size,
            });
        }

        let mut coefficients = slice.coefficients().to_vec();
        let mut symbol = slice.symbol().to_vec();
        for column in 0..num_blocks {
            if !coefficients[column] {
                continue;
            }
            match &pivots[column] {
                Some((pivot_coefficients, pivot_symbol)) => {
                    xor_bools_into(&mut coefficients, pivot_coefficients);
                    xor_into(&mut symbol, pivot_symbol);
                }
                None => {
                    pivots[column] = Some((coefficients, symbol));
                    break;
                }
            }
        }
    }

    let rank = pivots.iter().filter(|p| p.is_some()).count();
    if rank < num_blocks {
        return Err(SliceError::InsufficientSlices {
            rank,
            need: num_blocks,
        });
    }

    // back substitution, highest column first, so every pivot row ends up
    // with a unit coefficient vector and its symbol is exactly one block
    for column in (0..num_blocks).rev() {
        let (mut coefficients, mut symbol) = pivots[column]
            .take()
            .expect("full rank was just established");
        for later in column + 1..num_blocks {
            if coefficients[later] {
                let (later_coefficients, later_symbol) = pivots[later]
                    .as_ref()
                    .expect("full rank was just established");
                xor_bools_into(&mut coefficients, later_coefficients);
                xor_into(&mut symbol, later_symbol);
            }
        }
        pivots[column] = Some((coefficients, symbol));
    }

    let mut data = Vec::with_capacity(block_size * num_blocks);
    for pivot in pivots.into_iter().flatten() {
        data.extend_from_slice(&pivot.1);
    }
    data.truncate(length as usize);
    Ok(data)
}

fn xor_into(target: &mut [u8], source: &[u8]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t ^= s;
    }
}

fn xor_bools_into(target: &mut [bool], source: &[bool]) {
    for (t, s) in target.iter_mut().zip(source) {
        *t ^= s;
    }
}
