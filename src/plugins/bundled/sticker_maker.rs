//! Text stickers rendered with a built-in bitmap font.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, Rgba, RgbaImage};

use super::ensure_known_commands;
use crate::commands::{CommandError, CommandResult};
use crate::plugins::{PluginEntry, PluginError, PluginHost, PluginManifest, RegistrationHandle};
use crate::telegram::{OutgoingMedia, RouteContext, RouteHandler};

const COMMANDS: &[&str] = &["sticker", "stickerpack"];

/// Edge length of a sticker in pixels.
pub const STICKER_SIZE: u32 = 512;
/// Longest text accepted by `sticker`.
pub const MAX_STICKER_TEXT: usize = 100;
const WRAP_WIDTH: usize = 20;
const MARGIN: u32 = 32;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
// One column and one row of spacing per cell.
const CELL_WIDTH: u32 = GLYPH_WIDTH + 1;
const CELL_HEIGHT: u32 = GLYPH_HEIGHT + 1;

/// Colour scheme of a sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickerStyle {
    pub name: &'static str,
    pub background: [u8; 4],
    pub text: [u8; 4],
    pub stroke: [u8; 4],
    pub stroke_width: u32,
    /// Upper bound for the glyph scale factor.
    pub max_scale: u32,
}

pub const STYLES: &[StickerStyle] = &[
    StickerStyle {
        name: "default",
        background: [255, 255, 255, 0],
        text: [0, 0, 0, 255],
        stroke: [255, 255, 255, 255],
        stroke_width: 0,
        max_scale: 8,
    },
    StickerStyle {
        name: "bold",
        background: [255, 255, 255, 0],
        text: [0, 0, 0, 255],
        stroke: [255, 255, 255, 255],
        stroke_width: 3,
        max_scale: 10,
    },
    StickerStyle {
        name: "neon",
        background: [0, 0, 0, 255],
        text: [0, 255, 255, 255],
        stroke: [255, 0, 255, 255],
        stroke_width: 2,
        max_scale: 8,
    },
    StickerStyle {
        name: "fire",
        background: [255, 255, 255, 0],
        text: [255, 69, 0, 255],
        stroke: [255, 215, 0, 255],
        stroke_width: 2,
        max_scale: 8,
    },
    StickerStyle {
        name: "ice",
        background: [255, 255, 255, 0],
        text: [135, 206, 250, 255],
        stroke: [255, 255, 255, 255],
        stroke_width: 2,
        max_scale: 8,
    },
];

/// Looks up a style by name, case-insensitively.
#[must_use]
pub fn style(name: &str) -> Option<&'static StickerStyle> {
    STYLES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

fn default_style() -> &'static StickerStyle {
    &STYLES[0]
}

/// Rows of a 5x7 glyph, most significant of the low five bits on the left.
/// Letters are drawn upper case. Unknown characters fall back to `?`.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ' ' => [0; 7],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        ',' => [0, 0, 0, 0, 0b01100, 0b00100, 0b01000],
        '\'' => [0b01100, 0b00100, 0b01000, 0, 0, 0, 0],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '+' => [0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}

/// Word-wraps `text` into lines of at most `width` characters.
///
/// Words longer than `width` are split.
#[must_use]
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect::<String>());
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Renders `text` as a 512x512 RGBA image.
#[must_use]
pub fn render(text: &str, style: &StickerStyle) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(STICKER_SIZE, STICKER_SIZE, Rgba(style.background));
    let lines = wrap(text, WRAP_WIDTH);
    let columns = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    if columns == 0 {
        return canvas;
    }

    let usable = STICKER_SIZE - 2 * MARGIN;
    // Both counts are bounded by the text limit, so they fit in u32.
    let columns = u32::try_from(columns).unwrap_or(u32::MAX);
    let rows = u32::try_from(lines.len()).unwrap_or(u32::MAX);
    let scale = (usable / (columns * CELL_WIDTH))
        .min(usable / (rows * CELL_HEIGHT))
        .clamp(1, style.max_scale);

    let block_height = rows * CELL_HEIGHT * scale - scale;
    let top = (STICKER_SIZE.saturating_sub(block_height)) / 2;

    let side = STICKER_SIZE as usize;
    let mut mask = vec![false; side * side];
    for (row, line) in (0..).zip(&lines) {
        let count = u32::try_from(line.chars().count()).unwrap_or(u32::MAX);
        let line_width = count * CELL_WIDTH * scale - scale;
        let left = STICKER_SIZE.saturating_sub(line_width) / 2;
        let y0 = top + row * CELL_HEIGHT * scale;

        for (col, c) in (0..).zip(line.chars()) {
            let x0 = left + col * CELL_WIDTH * scale;
            for (gy, bits) in (0..).zip(glyph(c)) {
                for gx in 0..GLYPH_WIDTH {
                    if bits & (1 << (GLYPH_WIDTH - 1 - gx)) == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let x = x0 + gx * scale + dx;
                            let y = y0 + gy * scale + dy;
                            if x < STICKER_SIZE && y < STICKER_SIZE {
                                mask[y as usize * side + x as usize] = true;
                            }
                        }
                    }
                }
            }
        }
    }

    if style.stroke_width > 0 {
        let w = i64::from(style.stroke_width);
        let size = i64::from(STICKER_SIZE);
        for (i, _) in mask.iter().enumerate().filter(|(_, set)| **set) {
            #[allow(clippy::cast_possible_wrap)]
            let (x, y) = ((i % side) as i64, (i / side) as i64);
            for dy in -w..=w {
                for dx in -w..=w {
                    let (nx, ny) = (x + dx, y + dy);
                    if (0..size).contains(&nx) && (0..size).contains(&ny) {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        canvas.put_pixel(nx as u32, ny as u32, Rgba(style.stroke));
                    }
                }
            }
        }
    }

    for (i, _) in mask.iter().enumerate().filter(|(_, set)| **set) {
        #[allow(clippy::cast_possible_truncation)]
        canvas.put_pixel((i % side) as u32, (i / side) as u32, Rgba(style.text));
    }
    canvas
}

/// Renders and encodes a sticker as WebP.
pub fn render_webp(text: &str, style: &StickerStyle) -> Result<Vec<u8>, CommandError> {
    let mut out = Cursor::new(Vec::new());
    render(text, style).write_to(&mut out, ImageFormat::WebP)?;
    Ok(out.into_inner())
}

/// Splits `sticker` arguments into a style and the text.
///
/// A leading word only counts as a style when text follows it.
#[must_use]
pub fn parse_request(args: &[String], rest: &str) -> (&'static StickerStyle, String) {
    if args.len() > 1 {
        if let Some(style) = style(&args[0]) {
            let text = rest
                .split_once(char::is_whitespace)
                .map_or("", |(_, text)| text)
                .trim();
            return (style, text.to_owned());
        }
    }
    (default_style(), rest.to_owned())
}

/// Entry point `sticker_maker`.
pub struct StickerMakerEntry;

#[async_trait]
impl PluginEntry for StickerMakerEntry {
    fn name(&self) -> &'static str {
        "sticker_maker"
    }

    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError> {
        ensure_known_commands(manifest, COMMANDS)?;
        Ok(host.bind_manifest_commands(manifest, Arc::new(StickerMaker)).await)
    }
}

struct StickerMaker;

fn usage(prefix: &str) -> String {
    format!(
        "🎨 **STICKER MAKER**\n\n\
         **Usage:**\n\
         • `{prefix}sticker <text>` - Create basic sticker\n\
         • `{prefix}sticker <style> <text>` - Create styled sticker\n\n\
         **Available Styles:**\n\
         • `default` - Basic black text\n\
         • `bold` - Bold text with outline\n\
         • `neon` - Neon cyan on black\n\
         • `fire` - Orange-red with gold outline\n\
         • `ice` - Light blue with white outline\n\n\
         **Example:**\n`{prefix}sticker bold Hello World!`"
    )
}

fn pack_info(prefix: &str) -> String {
    format!(
        "📦 **NEXUS STICKER PACK**\n\n\
         **Create Custom Stickers:**\n\
         Use `{prefix}sticker` command to create text-based stickers\n\n\
         **Features:**\n\
         • Multiple text styles\n\
         • Transparent backgrounds\n\
         • 512x512 standard size\n\
         • Auto text wrapping\n\n\
         **Tips:**\n\
         • Keep text short for best results\n\
         • Use styles for visual impact"
    )
}

#[async_trait]
impl RouteHandler for StickerMaker {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        if ctx.invocation.command == "stickerpack" {
            return Ok(CommandResult::success(pack_info(ctx.prefix)));
        }
        if ctx.invocation.args.is_empty() {
            return Ok(CommandResult::success(usage(ctx.prefix)));
        }

        let (style, text) = parse_request(&ctx.invocation.args, &ctx.invocation.rest);
        if text.chars().count() > MAX_STICKER_TEXT {
            return Ok(CommandResult::error(format!(
                "❌ Text too long! Maximum {MAX_STICKER_TEXT} characters."
            )));
        }

        ctx.transport
            .respond(ctx.message, "🎨 Creating sticker...")
            .await?;
        let webp = tokio::task::spawn_blocking(move || render_webp(&text, style))
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))??;

        ctx.transport.delete(ctx.message).await?;
        ctx.transport
            .send_media(ctx.message, OutgoingMedia::sticker(webp))
            .await?;
        Ok(CommandResult::silent())
    }
}
