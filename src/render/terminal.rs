//! Live playback of frames in the terminal.
//!
//! Each channel gets a bordered braille canvas laid out in the configured
//! grid. Frames are paced to the target fps. `q`, Escape or Ctrl+C stop
//! playback by raising the shared cancel flag, which the pipeline checks at
//! every frame boundary.

use super::{RenderConfig, Renderer, Rgb};
use crate::pipeline::Frame;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Borders, Paragraph,
    },
};
use std::io::{stdout, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Renders frames to the terminal in real time.
pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    labels: Vec<String>,
    ncols: usize,
    fps: u32,
    nframes: usize,
    background: Color,
    line: Color,
    grid: Color,
    cancel: Arc<AtomicBool>,
    start: Option<Instant>,
    active: bool,
}

impl TerminalRenderer {
    /// Enters raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If the render colours are invalid
    /// - If the terminal cannot be initialized
    pub fn new(
        cfg: &RenderConfig,
        labels: Vec<String>,
        fps: u32,
        nframes: usize,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (background, line, grid) = cfg.palette()?;

        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            labels,
            ncols: cfg.ncols.max(1) as usize,
            fps: fps.max(1),
            nframes,
            background: to_color(background),
            line: to_color(line),
            grid: to_color(grid),
            cancel,
            start: None,
            active: true,
        })
    }

    /// Waits until `frame_index` is due, polling keys meanwhile.
    fn pace(&mut self, frame_index: usize) -> Result<()> {
        let start = *self.start.get_or_insert_with(Instant::now);
        let due = start + Duration::from_secs_f64(frame_index as f64 / self.fps as f64);

        loop {
            let timeout = due.saturating_duration_since(Instant::now());
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    let quit = match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => true,
                        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
                        _ => false,
                    };
                    if quit {
                        tracing::debug!("Preview stopped by user at frame {}", frame_index);
                        self.cancel.store(true, Ordering::SeqCst);
                        return Ok(());
                    }
                }
            }
            if Instant::now() >= due {
                return Ok(());
            }
        }
    }

    /// Restores the terminal.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Renderer for TerminalRenderer {
    fn render_frame(&mut self, frame: &Frame) -> Result<()> {
        self.pace(frame.index)?;
        if self.cancel.load(Ordering::SeqCst) {
            return Ok(());
        }

        let labels = &self.labels;
        let ncols = self.ncols;
        let (background, line, grid) = (self.background, self.line, self.grid);
        let nframes = self.nframes;

        self.terminal.draw(|f| {
            let area = f.area();
            let footer_height = 1;
            let content = Rect {
                height: area.height.saturating_sub(footer_height),
                ..area
            };

            for (i, (cell, window)) in grid_cells(content, frame.windows.len(), ncols)
                .into_iter()
                .zip(&frame.windows)
                .enumerate()
            {
                let title = labels.get(i).map(String::as_str).unwrap_or("");
                // braille gives two dots per cell horizontally
                let points = decimate(window, cell.width.saturating_sub(2) as usize * 2);
                let last_x = points.len().saturating_sub(1).max(1) as f64;

                let canvas = Canvas::default()
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(grid))
                            .title(title.to_string()),
                    )
                    .background_color(background)
                    .marker(Marker::Braille)
                    .x_bounds([0.0, last_x])
                    .y_bounds([-1.0, 1.0])
                    .paint(|ctx| {
                        ctx.draw(&CanvasLine {
                            x1: 0.0,
                            y1: 0.0,
                            x2: last_x,
                            y2: 0.0,
                            color: grid,
                        });
                        ctx.layer();
                        for pair in points.windows(2) {
                            ctx.draw(&CanvasLine {
                                x1: pair[0].0,
                                y1: pair[0].1,
                                x2: pair[1].0,
                                y2: pair[1].1,
                                color: line,
                            });
                        }
                    });
                f.render_widget(canvas, cell);
            }

            let footer_area = Rect {
                y: area.y + area.height.saturating_sub(footer_height),
                height: footer_height,
                ..area
            };
            let secs = frame.time_s.max(0.0) as u64;
            let footer = Paragraph::new(format!(
                "▶ {}:{:02} / frame {}/{} / q to stop",
                secs / 60,
                secs % 60,
                frame.index + 1,
                nframes
            ))
            .style(Style::default().fg(line).bg(background));
            f.render_widget(footer, footer_area);
        })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.cleanup()
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!("Failed to restore terminal: {}", e);
        }
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Splits `area` into `nchan` cells, `ncols` per row.
fn grid_cells(area: Rect, nchan: usize, ncols: usize) -> Vec<Rect> {
    if nchan == 0 {
        return Vec::new();
    }
    let ncols = ncols.clamp(1, nchan);
    let nrows = nchan.div_ceil(ncols);
    let (w, h) = (area.width as usize, area.height as usize);

    (0..nchan)
        .map(|i| {
            let (col, row) = (i % ncols, i / ncols);
            let x0 = col * w / ncols;
            let x1 = (col + 1) * w / ncols;
            let y0 = row * h / nrows;
            let y1 = (row + 1) * h / nrows;
            Rect {
                x: area.x + x0 as u16,
                y: area.y + y0 as u16,
                width: (x1 - x0) as u16,
                height: (y1 - y0) as u16,
            }
        })
        .collect()
}

/// Reduces `window` to at most `max_points` (x, y) points, keeping the
/// extreme of each bucket so peaks survive.
fn decimate(window: &[f32], max_points: usize) -> Vec<(f64, f64)> {
    let max_points = max_points.max(2);
    if window.len() <= max_points {
        return window
            .iter()
            .enumerate()
            .map(|(i, &s)| (i as f64, s.clamp(-1.0, 1.0) as f64))
            .collect();
    }

    (0..max_points)
        .map(|p| {
            let lo = p * window.len() / max_points;
            let hi = ((p + 1) * window.len() / max_points).max(lo + 1);
            let peak = window[lo..hi]
                .iter()
                .copied()
                .fold(0.0f32, |acc, s| if s.abs() > acc.abs() { s } else { acc });
            (p as f64, peak.clamp(-1.0, 1.0) as f64)
        })
        .collect()
}
