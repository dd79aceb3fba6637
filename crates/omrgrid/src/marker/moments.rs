//! Moment-based size normalization.

use super::{Grid, GRID};

/// Dense boolean ink bitmap, row-major.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InkBitmap {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl InkBitmap {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    pub(crate) fn set(&mut self, x: usize, y: usize) {
        self.data[y * self.width + x] = true;
    }

    pub(crate) fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x]
    }

    /// Sub-bitmap spanning the rows and columns that contain ink, or `None`
    /// when there is no ink.
    pub(crate) fn crop_to_ink(&self) -> Option<Self> {
        let mut row_has = vec![false; self.height];
        let mut col_has = vec![false; self.width];
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    row_has[y] = true;
                    col_has[x] = true;
                }
            }
        }
        let top = row_has.iter().position(|&b| b)?;
        let bottom = row_has.iter().rposition(|&b| b)?;
        let left = col_has.iter().position(|&b| b)?;
        let right = col_has.iter().rposition(|&b| b)?;

        let mut out = Self::new(right - left + 1, bottom - top + 1);
        for y in top..=bottom {
            for x in left..=right {
                if self.get(x, y) {
                    out.set(x - left, y - top);
                }
            }
        }
        Some(out)
    }
}

/// Resample the glyph onto the fixed grid.
///
/// The glyph is centered on its centroid and scaled per axis so that four
/// standard deviations of ink fill the grid along the longer axis; the
/// shorter axis keeps a softened (cube-root) share of the aspect ratio.
pub(crate) fn normalize(glyph: &InkBitmap, supersample: u32, density: f32) -> Grid {
    let mut grid = [[false; GRID]; GRID];

    let mut mass = 0.0f64;
    let (mut sx, mut sy) = (0.0f64, 0.0f64);
    for y in 0..glyph.height {
        for x in 0..glyph.width {
            if glyph.get(x, y) {
                mass += 1.0;
                sx += x as f64 + 0.5;
                sy += y as f64 + 0.5;
            }
        }
    }
    if mass == 0.0 {
        return grid;
    }
    let xc = sx / mass;
    let yc = sy / mass;

    let (mut mu20, mut mu02) = (0.0f64, 0.0f64);
    for y in 0..glyph.height {
        for x in 0..glyph.width {
            if glyph.get(x, y) {
                mu20 += (x as f64 + 0.5 - xc).powi(2);
                mu02 += (y as f64 + 0.5 - yc).powi(2);
            }
        }
    }
    mu20 /= mass;
    mu02 /= mass;

    let w1 = (4.0 * mu20.sqrt()).max(1.0);
    let h1 = (4.0 * mu02.sqrt()).max(1.0);
    let r2 = (w1.min(h1) / w1.max(h1)).cbrt();
    let side = GRID as f64;
    let (w2, h2) = if w1 >= h1 {
        (side, side * r2)
    } else {
        (side * r2, side)
    };
    let alpha = w2 / w1;
    let beta = h2 / h1;

    let s = supersample as f64;
    let samples = (supersample * supersample) as f32;
    let half = side / 2.0;
    for (v, row) in grid.iter_mut().enumerate() {
        for (u, cell) in row.iter_mut().enumerate() {
            let mut hits = 0u32;
            for sj in 0..supersample {
                let gy = (v as f64 + (sj as f64 + 0.5) / s - half) / beta + yc;
                for si in 0..supersample {
                    let gx = (u as f64 + (si as f64 + 0.5) / s - half) / alpha + xc;
                    let xi = gx.floor();
                    let yi = gy.floor();
                    if xi >= 0.0
                        && yi >= 0.0
                        && (xi as usize) < glyph.width
                        && (yi as usize) < glyph.height
                        && glyph.get(xi as usize, yi as usize)
                    {
                        hits += 1;
                    }
                }
            }
            *cell = hits as f32 / samples >= density;
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap_from(rows: &[&str]) -> InkBitmap {
        let mut b = InkBitmap::new(rows[0].len(), rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    b.set(x, y);
                }
            }
        }
        b
    }

    #[test]
    fn crop_finds_ink_bounds() {
        let b = bitmap_from(&["....", ".#..", "..#.", "...."]);
        let c = b.crop_to_ink().unwrap();
        assert_eq!((c.width, c.height), (2, 2));
        assert!(c.get(0, 0) && c.get(1, 1));
        assert!(!c.get(1, 0));
    }

    #[test]
    fn crop_of_empty_bitmap_is_none() {
        assert!(InkBitmap::new(5, 5).crop_to_ink().is_none());
    }

    #[test]
    fn solid_square_fills_grid_center() {
        let mut b = InkBitmap::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                b.set(x, y);
            }
        }
        let g = normalize(&b, 4, 0.15);
        assert!(g[GRID / 2][GRID / 2]);
        // Symmetric input gives a symmetric grid.
        for y in 0..GRID {
            for x in 0..GRID {
                assert_eq!(g[y][x], g[x][y]);
                assert_eq!(g[y][x], g[y][GRID - 1 - x]);
            }
        }
    }

    #[test]
    fn normalization_is_scale_invariant_for_squares() {
        let square = |n: usize| {
            let mut b = InkBitmap::new(n, n);
            for y in 0..n {
                for x in 0..n {
                    b.set(x, y);
                }
            }
            normalize(&b, 4, 0.15)
        };
        assert_eq!(square(6), square(12));
    }
}
