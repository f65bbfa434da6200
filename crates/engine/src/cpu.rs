//! Tile-parallel CPU backend
//!
//! Decomposes the output grid into independent tiles, runs one counting
//! task per tile on a bounded worker pool, joins on a completion
//! countdown, and freezes the accumulator.

use crossbeam_channel::bounded;
use rayon::ThreadPoolBuilder;
use tracing::{debug, error};

use gridshift_core::{Error, Raster, Result};

use crate::accumulator::ChangeMatrixAccumulator;
use crate::domain::ClassDomain;
use crate::roi::RoiMask;

/// A rectangular sub-region of the raster grid, processed as one unit of
/// work. Counting is pointwise, so tiles carry no overlap.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of rows in this tile
    pub rows: usize,
    /// Number of columns in this tile
    pub cols: usize,
}

/// Iterator over the non-overlapping tiles covering a raster
pub struct TileGrid {
    total_rows: usize,
    total_cols: usize,
    tile_size: usize,
    current_row: usize,
    current_col: usize,
}

impl TileGrid {
    /// Create a tile iterator over a `total_rows` x `total_cols` grid
    pub fn new(total_rows: usize, total_cols: usize, tile_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            tile_size,
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for TileGrid {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let tile = Tile {
            row_offset: self.current_row,
            col_offset: self.current_col,
            rows: self.tile_size.min(self.total_rows - self.current_row),
            cols: self.tile_size.min(self.total_cols - self.current_col),
        };

        self.current_col += self.tile_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.tile_size;
        }

        Some(tile)
    }
}

/// Parameters for the CPU backend
#[derive(Debug, Clone)]
pub struct CpuParams {
    /// Tile edge length in pixels
    pub tile_size: usize,
    /// Worker pool size; `None` uses the process-wide pool
    pub threads: Option<usize>,
}

impl Default for CpuParams {
    fn default() -> Self {
        Self {
            tile_size: 256,
            threads: None,
        }
    }
}

/// Run the tile-parallel accumulation and return the frozen accumulator.
///
/// One task per tile is submitted to the worker pool; every task signals
/// completion on a countdown channel sized to the tile count, and the
/// scheduler blocks until all signals have arrived before freezing. A
/// task error is logged and fails the whole computation after the
/// remaining tiles drain; a worker that dies without signaling surfaces
/// as [`Error::Interrupted`]. In both cases the accumulator is never
/// frozen and no partial result escapes.
///
/// Counts are plain sums, so the result is identical for every tile size
/// and pool width.
pub fn compute_cpu(
    reference: &Raster<u16>,
    current: &Raster<u16>,
    domain: &ClassDomain,
    roi: Option<&RoiMask>,
    area: Option<&Raster<f64>>,
    params: &CpuParams,
) -> Result<ChangeMatrixAccumulator> {
    if params.tile_size == 0 {
        return Err(Error::InvalidParameter {
            name: "tile_size",
            value: "0".into(),
            reason: "tiles must span at least one pixel".into(),
        });
    }

    reference.co_registered_with(current)?;
    if let Some(area) = area {
        reference.co_registered_with(area)?;
    }
    let (rows, cols) = reference.shape();
    if let Some(roi) = roi {
        if roi.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: roi.shape().0,
                ac: roi.shape().1,
            });
        }
    }

    let accumulator = ChangeMatrixAccumulator::new(domain.clone());
    let tiles: Vec<Tile> = TileGrid::new(rows, cols, params.tile_size).collect();
    debug!(
        tiles = tiles.len(),
        tile_size = params.tile_size,
        threads = ?params.threads,
        "scheduling change-matrix tiles"
    );

    let run = || {
        rayon::scope(|scope| -> Result<()> {
            let (done_tx, done_rx) = bounded::<Result<()>>(tiles.len());

            for &tile in &tiles {
                let done = done_tx.clone();
                let accumulator = &accumulator;
                scope.spawn(move |_| {
                    let outcome =
                        process_tile(tile, reference, current, domain, roi, area, accumulator);
                    // Receiver only disconnects after the countdown completes
                    let _ = done.send(outcome);
                });
            }
            drop(done_tx);

            // Countdown barrier: one signal per submitted tile.
            let mut first_failure: Option<Error> = None;
            for _ in 0..tiles.len() {
                match done_rx.recv() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(error = %e, "tile task failed");
                        first_failure.get_or_insert(e);
                    }
                    Err(_) => {
                        error!("tile completion channel disconnected before countdown finished");
                        first_failure.get_or_insert(Error::Interrupted);
                        break;
                    }
                }
            }

            match first_failure {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    };

    match params.threads {
        Some(threads) => {
            let pool = ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::Other(format!("failed to build worker pool: {e}")))?;
            pool.install(run)?;
        }
        None => run()?,
    }

    accumulator.freeze()?;
    Ok(accumulator)
}

/// Accumulate one tile. Pixels outside the ROI or whose reference or
/// current label is not a domain class (label 0 included) are skipped.
fn process_tile(
    tile: Tile,
    reference: &Raster<u16>,
    current: &Raster<u16>,
    domain: &ClassDomain,
    roi: Option<&RoiMask>,
    area: Option<&Raster<f64>>,
    accumulator: &ChangeMatrixAccumulator,
) -> Result<()> {
    for row in tile.row_offset..tile.row_offset + tile.rows {
        for col in tile.col_offset..tile.col_offset + tile.cols {
            if let Some(roi) = roi {
                if !unsafe { roi.contains_unchecked(row, col) } {
                    continue;
                }
            }

            let ref_class = unsafe { reference.get_unchecked(row, col) };
            if !domain.contains(ref_class) {
                continue;
            }
            let cur_class = unsafe { current.get_unchecked(row, col) };
            if !domain.contains(cur_class) {
                continue;
            }

            let weight = match area {
                Some(area) => unsafe { area.get_unchecked(row, col) },
                None => 1.0,
            };
            accumulator.increment(ref_class, cur_class, weight)?;
        }
    }
    Ok(())
}
