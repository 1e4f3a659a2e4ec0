//! RGB24 rasterization of frames.
//!
//! Channels are laid out in a grid of `ncols` columns, filled row by row.
//! Each window is drawn as a polyline scaled so that +-1.0 spans the cell
//! height, over a centre line and cell dividers in the grid colour.

use super::{RenderConfig, Rgb};
use crate::error::ConfigError;
use crate::pipeline::Frame;

/// Reusable RGB24 frame buffer.
pub struct FrameCanvas {
    width: usize,
    height: usize,
    ncols: usize,
    background: Rgb,
    line: Rgb,
    grid: Rgb,
    pixels: Vec<u8>,
}

/// Pixel bounds of one grid cell, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl FrameCanvas {
    /// # Errors
    /// Returns an error if a configured colour cannot be parsed.
    pub fn new(cfg: &RenderConfig) -> Result<Self, ConfigError> {
        let (background, line, grid) = cfg.palette()?;
        let width = cfg.width as usize;
        let height = cfg.height as usize;
        Ok(Self {
            width,
            height,
            ncols: cfg.ncols.max(1) as usize,
            background,
            line,
            grid,
            pixels: vec![0; width * height * 3],
        })
    }

    /// Draws `frame` and returns the RGB24 pixel data, row-major.
    pub fn draw(&mut self, frame: &Frame) -> &[u8] {
        self.clear();

        let nchan = frame.windows.len();
        if nchan == 0 {
            return &self.pixels;
        }

        let ncols = self.ncols.min(nchan);
        let nrows = nchan.div_ceil(ncols);

        for (i, window) in frame.windows.iter().enumerate() {
            let cell = self.cell(i % ncols, i / ncols, ncols, nrows);
            self.draw_grid(cell);
            self.draw_wave(cell, window);
        }

        &self.pixels
    }

    fn cell(&self, col: usize, row: usize, ncols: usize, nrows: usize) -> Cell {
        Cell {
            x0: col * self.width / ncols,
            x1: (col + 1) * self.width / ncols,
            y0: row * self.height / nrows,
            y1: (row + 1) * self.height / nrows,
        }
    }

    fn clear(&mut self) {
        let Rgb(r, g, b) = self.background;
        for px in self.pixels.chunks_exact_mut(3) {
            px.copy_from_slice(&[r, g, b]);
        }
    }

    fn put(&mut self, x: usize, y: usize, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let at = (y * self.width + x) * 3;
        self.pixels[at..at + 3].copy_from_slice(&[color.0, color.1, color.2]);
    }

    fn draw_grid(&mut self, cell: Cell) {
        let grid = self.grid;
        let cy = cell.y0 + (cell.y1 - cell.y0) / 2;
        for x in cell.x0..cell.x1 {
            self.put(x, cy, grid);
        }
        if cell.x0 > 0 {
            for y in cell.y0..cell.y1 {
                self.put(cell.x0, y, grid);
            }
        }
        if cell.y0 > 0 {
            for x in cell.x0..cell.x1 {
                self.put(x, cell.y0, grid);
            }
        }
    }

    fn draw_wave(&mut self, cell: Cell, window: &[f32]) {
        let cw = cell.x1 - cell.x0;
        let ch = cell.y1 - cell.y0;
        if cw == 0 || ch == 0 || window.is_empty() {
            return;
        }

        let cy = (cell.y0 + ch / 2) as f32;
        let amp = (ch as f32 / 2.0 - 1.0).max(0.0);
        let y_at = |s: f32| -> usize {
            let y = (cy - s.clamp(-1.0, 1.0) * amp).round();
            (y.max(cell.y0 as f32) as usize).min(cell.y1 - 1)
        };
        let last = (window.len() - 1) as f32;
        let span = (cw.max(2) - 1) as f32;

        let line = self.line;
        let mut prev_y: Option<usize> = None;
        for dx in 0..cw {
            let pos = dx as f32 * last / span;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(window.len() - 1);
            let frac = pos - lo as f32;
            let sample = window[lo] * (1.0 - frac) + window[hi] * frac;
            let y = y_at(sample);

            let (from, to) = match prev_y {
                Some(p) if p < y => (p + 1, y),
                Some(p) if p > y => (y, p - 1),
                _ => (y, y),
            };
            for yy in from..=to {
                self.put(cell.x0 + dx, yy, line);
            }
            prev_y = Some(y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: u32, height: u32, ncols: u32) -> RenderConfig {
        RenderConfig {
            width,
            height,
            ncols,
            background: "#000000".to_string(),
            line_color: "#ffffff".to_string(),
            grid_color: "#ff0000".to_string(),
            ..Default::default()
        }
    }

    fn pixel(buf: &[u8], width: usize, x: usize, y: usize) -> [u8; 3] {
        let at = (y * width + x) * 3;
        [buf[at], buf[at + 1], buf[at + 2]]
    }

    fn frame(windows: Vec<Vec<f32>>) -> Frame {
        Frame {
            index: 0,
            time_s: 0.0,
            windows,
        }
    }

    #[test]
    fn buffer_has_rgb24_size() {
        let mut canvas = FrameCanvas::new(&config(64, 48, 1)).unwrap();
        assert_eq!(canvas.draw(&frame(vec![vec![0.0; 10]])).len(), 64 * 48 * 3);
    }

    #[test]
    fn silent_window_draws_centre_line() {
        let mut canvas = FrameCanvas::new(&config(64, 48, 1)).unwrap();
        let buf = canvas.draw(&frame(vec![vec![0.0; 100]])).to_vec();
        for x in 0..64 {
            assert_eq!(pixel(&buf, 64, x, 24), [255, 255, 255]);
            assert_eq!(pixel(&buf, 64, x, 10), [0, 0, 0]);
        }
    }

    #[test]
    fn full_scale_samples_reach_cell_edges() {
        let mut canvas = FrameCanvas::new(&config(40, 40, 1)).unwrap();
        let buf = canvas.draw(&frame(vec![vec![1.0, 1.0], vec![-1.0, -1.0]])).to_vec();
        // two rows of 20px each; +1.0 sits one pixel below the top of row 0
        assert_eq!(pixel(&buf, 40, 5, 1), [255, 255, 255]);
        // -1.0 sits one pixel above the bottom of row 1
        assert_eq!(pixel(&buf, 40, 5, 39), [255, 255, 255]);
        // the divider between rows is grid coloured away from the waves
        assert_eq!(pixel(&buf, 40, 5, 20), [255, 0, 0]);
    }

    #[test]
    fn channels_fill_grid_columns_first() {
        let mut canvas = FrameCanvas::new(&config(40, 20, 2)).unwrap();
        let buf = canvas
            .draw(&frame(vec![vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]]))
            .to_vec();
        // two rows of 10px; third channel lands in row 1, column 0
        assert_eq!(pixel(&buf, 40, 5, 5), [255, 255, 255]);
        assert_eq!(pixel(&buf, 40, 25, 5), [255, 255, 255]);
        assert_eq!(pixel(&buf, 40, 5, 15), [255, 255, 255]);
        assert_eq!(pixel(&buf, 40, 25, 15), [0, 0, 0]);
    }
}
