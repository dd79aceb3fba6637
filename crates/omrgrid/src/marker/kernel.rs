//! Re-centering and X-kernel correlation on the normalized grid.

use super::{Grid, GRID};

/// X template: `+9` within one cell of either diagonal, `-8` elsewhere.
/// Weights sum to 1 so a solid blob scores near zero.
#[rustfmt::skip]
const KERNEL: [[i8; GRID]; GRID] = [
    [ 9,  9, -8, -8, -8, -8, -8, -8, -8,  9,  9],
    [ 9,  9,  9, -8, -8, -8, -8, -8,  9,  9,  9],
    [-8,  9,  9,  9, -8, -8, -8,  9,  9,  9, -8],
    [-8, -8,  9,  9,  9, -8,  9,  9,  9, -8, -8],
    [-8, -8, -8,  9,  9,  9,  9,  9, -8, -8, -8],
    [-8, -8, -8, -8,  9,  9,  9, -8, -8, -8, -8],
    [-8, -8, -8,  9,  9,  9,  9,  9, -8, -8, -8],
    [-8, -8,  9,  9,  9, -8,  9,  9,  9, -8, -8],
    [-8,  9,  9,  9, -8, -8, -8,  9,  9,  9, -8],
    [ 9,  9,  9, -8, -8, -8, -8, -8,  9,  9,  9],
    [ 9,  9, -8, -8, -8, -8, -8, -8, -8,  9,  9],
];

const MASK_RADIUS: i32 = 3;

/// Center-weighted ink sum of a 7×7 window, weights 4 (center) down to 1
/// (outer ring).
fn center_weight(grid: &Grid, dx: i32, dy: i32) -> i32 {
    let c = (GRID / 2) as i32;
    let mut sum = 0;
    for i in -MASK_RADIUS..=MASK_RADIUS {
        for j in -MASK_RADIUS..=MASK_RADIUS {
            let y = c + dy + i;
            let x = c + dx + j;
            if (0..GRID as i32).contains(&x)
                && (0..GRID as i32).contains(&y)
                && grid[y as usize][x as usize]
            {
                sum += MASK_RADIUS + 1 - i.abs().max(j.abs());
            }
        }
    }
    sum
}

/// Shift the grid so its center-weighted ink mass sits in the middle.
///
/// Shifts are searched in `[-radius, radius]²`; a shift replaces the current
/// best only when strictly better, so ties keep the unshifted grid.
pub(crate) fn recenter(grid: &Grid, radius: i32) -> Grid {
    let mut best = (center_weight(grid, 0, 0), 0, 0);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let s = center_weight(grid, dx, dy);
            if s > best.0 {
                best = (s, dx, dy);
            }
        }
    }
    let (_, dx, dy) = best;
    if dx == 0 && dy == 0 {
        return *grid;
    }

    let mut out = [[false; GRID]; GRID];
    for (y, row) in out.iter_mut().enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            let sx = x as i32 + dx;
            let sy = y as i32 + dy;
            if (0..GRID as i32).contains(&sx) && (0..GRID as i32).contains(&sy) {
                *cell = grid[sy as usize][sx as usize];
            }
        }
    }
    out
}

/// Correlate the grid, read as ±1 per cell, with the X kernel.
pub(crate) fn correlate(grid: &Grid) -> i32 {
    let mut score = 0i32;
    for (krow, grow) in KERNEL.iter().zip(grid) {
        for (&k, &ink) in krow.iter().zip(grow) {
            let s = if ink { 1 } else { -1 };
            score += k as i32 * s;
        }
    }
    score
}
