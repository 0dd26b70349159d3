use crate::render::{draw_overlay_popup, Frame, Renderer, TitleOverlay};
use std::io::Write;

const HALF_BLOCK: char = '\u{2580}';

pub struct HalfBlockRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl Default for HalfBlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }

    fn set_fg(&mut self, out: &mut dyn Write, c: (u8, u8, u8)) -> std::io::Result<()> {
        if self.last_fg != Some(c) {
            write!(out, "\x1b[38;2;{};{};{}m", c.0, c.1, c.2)?;
            self.last_fg = Some(c);
        }
        Ok(())
    }

    fn set_bg(&mut self, out: &mut dyn Write, c: (u8, u8, u8)) -> std::io::Result<()> {
        if self.last_bg != Some(c) {
            write!(out, "\x1b[48;2;{};{};{}m", c.0, c.1, c.2)?;
            self.last_bg = Some(c);
        }
        Ok(())
    }
}

/// Columns `[start, start + len)` covered by a centered title, and its chars.
fn title_span(title: &TitleOverlay<'_>, cols: usize) -> (usize, Vec<char>) {
    let chars: Vec<char> = title.text.chars().take(cols).collect();
    let start = cols.saturating_sub(chars.len()) / 2;
    (start, chars)
}

fn mix(a: (u8, u8, u8), b: (u8, u8, u8), t: f32) -> (u8, u8, u8) {
    let t = t.clamp(0.0, 1.0);
    let m = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    (m(a.0, b.0), m(a.1, b.1), m(a.2, b.2))
}

impl Renderer for HalfBlockRenderer {
    fn name(&self) -> &'static str {
        "halfblock"
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let cols = frame.term_cols as usize;
        let visual_rows = frame.visual_rows as usize;
        let w = frame.pixel_width;
        let h = frame.pixel_height;

        if cols == 0 || visual_rows == 0 || w == 0 || h == 0 {
            return Ok(());
        }
        if w != cols || h != visual_rows.saturating_mul(2) {
            return Ok(());
        }
        if frame.pixels_rgba.len() < w.saturating_mul(h).saturating_mul(4) {
            return Ok(());
        }

        if frame.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }

        out.write_all(b"\x1b[H\x1b[0m")?;
        // Autowrap off while full-width rows are painted.
        out.write_all(b"\x1b[?7l")?;
        self.last_fg = None;
        self.last_bg = None;

        let title = frame
            .title
            .as_ref()
            .filter(|t| (t.row as usize) < visual_rows && t.opacity > 0.0)
            .map(|t| (t, title_span(t, cols)));

        let px = |i: usize| {
            (
                frame.pixels_rgba[i],
                frame.pixels_rgba[i + 1],
                frame.pixels_rgba[i + 2],
            )
        };

        for row in 0..visual_rows {
            let top_y = row * 2;
            let bot_y = top_y + 1;
            for x in 0..cols {
                let top = px((top_y * w + x) * 4);
                let bot = px((bot_y * w + x) * 4);

                if let Some((t, (start, chars))) = &title {
                    if row == t.row as usize && x >= *start && x < start + chars.len() {
                        let under = mix(top, bot, 0.5);
                        self.set_bg(out, under)?;
                        self.set_fg(out, mix(under, t.rgb, t.opacity))?;
                        write!(out, "{}", chars[x - start])?;
                        continue;
                    }
                }

                self.set_fg(out, top)?;
                self.set_bg(out, bot)?;
                write!(out, "{HALF_BLOCK}")?;
            }
            out.write_all(b"\r\n")?;
        }

        let mut hud_lines = frame.hud.lines();
        for i in 0..(frame.hud_rows as usize) {
            write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", visual_rows + i + 1)?;
            if let Some(line) = hud_lines.next() {
                let clipped: String = line.chars().take(cols).collect();
                write!(out, "{clipped}")?;
            }
        }

        if let Some(text) = frame.overlay {
            draw_overlay_popup(out, frame.term_cols, frame.term_rows, text)?;
        }

        out.write_all(b"\x1b[?7h")?;

        if frame.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}
