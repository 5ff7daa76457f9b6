//! Fixed-size vertical image of a day.
//!
//! Composition goes through [`Canvas`] so the layout can be checked without a
//! rasteriser. [`SvgCanvas`] records the scene, which `resvg` rasterises and
//! the `image` crate encodes as JPEG.

use super::{DayExport, MAX_STRIP_PHOTOS};
use crate::model::{truncate_chars, Point, Rect};
use ::image::codecs::jpeg::JpegEncoder;
use ::image::{DynamicImage, RgbaImage};
use maud::html;
use resvg::{tiny_skia, usvg};
use std::fmt::Write;
use thiserror::Error;

pub const WIDTH: f64 = 1080.0;
pub const HEIGHT: f64 = 1920.0;

const PATTERN_SPACING: f64 = 50.0;
const VERSE_LINE_HEIGHT: f64 = 45.0;
const PHOTO_SIZE: f64 = 400.0;
const PHOTO_PADDING: f64 = 20.0;
const GRID_TOP: f64 = 800.0;
const NOTES_TOP: f64 = 1650.0;
const MAX_NOTES: usize = 2;
const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("could not read the composed scene: {0}")]
    Scene(#[from] usvg::Error),
    #[error("could not allocate a {0}x{1} image")]
    Allocate(u32, u32),
    #[error("could not encode JPEG: {0}")]
    Encode(#[from] ::image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    pub family: &'static str,
    pub color: &'static str,
    pub align: Align,
}

impl TextStyle {
    fn new(size: f64, color: &'static str) -> Self {
        TextStyle {
            size,
            bold: false,
            italic: false,
            family: "Arial, sans-serif",
            color,
            align: Align::Center,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn family(mut self, family: &'static str) -> Self {
        self.family = family;
        self
    }

    fn left(mut self) -> Self {
        self.align = Align::Left;
        self
    }
}

/// 2D drawing surface.
pub trait Canvas {
    fn size(&self) -> (f64, f64);
    fn linear_gradient(&mut self, stops: &[(f64, &str)]);
    fn line(&mut self, from: Point, to: Point, color: &str, width: f64, opacity: f64);
    fn rect(&mut self, rect: Rect, fill: &str);
    fn rounded_rect(&mut self, rect: Rect, radius: f64, fill: &str);
    fn text(&mut self, text: &str, at: Point, style: &TextStyle);
    fn image(&mut self, rect: Rect, href: &str);
    fn measure_text(&self, text: &str, style: &TextStyle) -> f64;
}

#[derive(Debug, Clone)]
pub struct SvgCanvas {
    width: f64,
    height: f64,
    defs: String,
    body: String,
    gradients: usize,
}

impl SvgCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        SvgCanvas {
            width,
            height,
            defs: String::new(),
            body: String::new(),
            gradients: 0,
        }
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\"><defs>{}</defs>{}</svg>",
            self.defs,
            self.body,
            w = self.width,
            h = self.height
        )
    }
}

fn escape(text: &str) -> String {
    html! { (text) }.into_string()
}

impl Canvas for SvgCanvas {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn linear_gradient(&mut self, stops: &[(f64, &str)]) {
        self.gradients += 1;
        let id = format!("bg{}", self.gradients);
        let _ = write!(
            self.defs,
            "<linearGradient id=\"{}\" x1=\"0\" y1=\"0\" x2=\"1\" y2=\"1\">",
            id
        );
        for (offset, color) in stops {
            let _ = write!(
                self.defs,
                "<stop offset=\"{}\" stop-color=\"{}\"/>",
                offset,
                escape(color)
            );
        }
        self.defs.push_str("</linearGradient>");
        let _ = write!(
            self.body,
            "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"url(#{})\"/>",
            self.width, self.height, id
        );
    }

    fn line(&mut self, from: Point, to: Point, color: &str, width: f64, opacity: f64) {
        let _ = write!(
            self.body,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{}\" stroke-width=\"{}\" opacity=\"{}\"/>",
            from.x,
            from.y,
            to.x,
            to.y,
            escape(color),
            width,
            opacity
        );
    }

    fn rect(&mut self, rect: Rect, fill: &str) {
        self.rounded_rect(rect, 0.0, fill);
    }

    fn rounded_rect(&mut self, rect: Rect, radius: f64, fill: &str) {
        let _ = write!(
            self.body,
            "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"{}\"/>",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            radius,
            escape(fill)
        );
    }

    fn text(&mut self, text: &str, at: Point, style: &TextStyle) {
        let anchor = match style.align {
            Align::Left => "start",
            Align::Center => "middle",
        };
        let _ = write!(
            self.body,
            "<text x=\"{}\" y=\"{}\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" font-style=\"{}\" fill=\"{}\" text-anchor=\"{}\" dominant-baseline=\"middle\">{}</text>",
            at.x,
            at.y,
            escape(style.family),
            style.size,
            if style.bold { "bold" } else { "normal" },
            if style.italic { "italic" } else { "normal" },
            escape(style.color),
            anchor,
            escape(text)
        );
    }

    fn image(&mut self, rect: Rect, href: &str) {
        let _ = write!(
            self.body,
            "<image x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" preserveAspectRatio=\"xMidYMid slice\" href=\"{}\"/>",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            escape(href)
        );
    }

    /// Approximation: average glyph advance of roughly half the font size.
    fn measure_text(&self, text: &str, style: &TextStyle) -> f64 {
        text.chars().count() as f64 * style.size * 0.5
    }
}

/// Greedy word wrap against a width measure.
pub fn wrap_text(text: &str, max_width: f64, measure: impl Fn(&str) -> f64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", line, word)
        };
        if measure(&candidate) > max_width && !line.is_empty() {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

pub fn compose(canvas: &mut dyn Canvas, day: &DayExport<'_>) {
    let (width, height) = canvas.size();

    canvas.linear_gradient(&[(0.0, "#667eea"), (0.5, "#764ba2"), (1.0, "#f093fb")]);
    let mut offset = -height;
    while offset < width {
        canvas.line(
            Point::new(offset, 0.0),
            Point::new(offset + height, height),
            "#ffffff",
            2.0,
            0.1,
        );
        offset += PATTERN_SPACING;
    }

    draw_header(canvas, width, &day.date_string);

    if let Some(location) = &day.location {
        canvas.rounded_rect(
            Rect::new(50.0, 330.0, width - 100.0, 100.0),
            20.0,
            "rgba(255, 255, 255, 0.8)",
        );
        canvas.text("📍", Point::new(80.0, 380.0), &TextStyle::new(48.0, "#FF4444").left());
        let label = location
            .label()
            .unwrap_or_else(|| "Unknown Location".to_string());
        canvas.text(&label, Point::new(150.0, 380.0), &TextStyle::new(36.0, "#333").left());
    }

    if let Some(verse) = day.verse {
        canvas.rounded_rect(
            Rect::new(50.0, 460.0, width - 100.0, 300.0),
            25.0,
            "rgba(255, 236, 179, 0.9)",
        );
        let style = TextStyle::new(32.0, "#5a4a42")
            .italic()
            .family("Georgia, serif");
        let lines = wrap_text(&verse.text, width - 150.0, |line| {
            canvas.measure_text(line, &style)
        });
        let mut y = 530.0;
        for line in &lines {
            canvas.text(line, Point::new(width / 2.0, y), &style);
            y += VERSE_LINE_HEIGHT;
        }
        canvas.text(
            &verse.reference,
            Point::new(width / 2.0, y + 15.0),
            &TextStyle::new(28.0, "#8a7a72"),
        );
    }

    let photos = day.strip_photos();
    if !photos.is_empty() {
        canvas.rounded_rect(
            Rect::new(
                30.0,
                GRID_TOP - 20.0,
                width - 60.0,
                PHOTO_SIZE * 2.0 + PHOTO_PADDING * 3.0,
            ),
            30.0,
            "rgba(0, 0, 0, 0.8)",
        );
        let grid_left = (width - (PHOTO_SIZE * 2.0 + PHOTO_PADDING)) / 2.0;
        for (i, photo) in photos.iter().enumerate().take(MAX_STRIP_PHOTOS) {
            let x = grid_left + (i % 2) as f64 * (PHOTO_SIZE + PHOTO_PADDING);
            let y = GRID_TOP + (i / 2) as f64 * (PHOTO_SIZE + PHOTO_PADDING);
            canvas.rect(
                Rect::new(x - 5.0, y - 5.0, PHOTO_SIZE + 10.0, PHOTO_SIZE + 10.0),
                "#ffffff",
            );
            canvas.image(Rect::new(x, y, PHOTO_SIZE, PHOTO_SIZE), &photo.data_uri);
        }
    }

    if !day.notes.is_empty() {
        canvas.rounded_rect(
            Rect::new(50.0, NOTES_TOP, width - 100.0, 200.0),
            25.0,
            "rgba(255, 255, 255, 0.9)",
        );
        let style = TextStyle::new(28.0, "#444").left();
        let mut y = NOTES_TOP + 50.0;
        for note in day.notes.iter().take(MAX_NOTES) {
            let line = format!("• {}", truncate_chars(note.lines().next().unwrap_or(""), 50));
            canvas.text(&line, Point::new(80.0, y), &style);
            y += 40.0;
        }
        if day.notes.len() > MAX_NOTES {
            canvas.text(
                &format!("+{} more notes...", day.notes.len() - MAX_NOTES),
                Point::new(80.0, y + 20.0),
                &TextStyle::new(24.0, "#999").italic().left(),
            );
        }
    }

    let stickers = [
        ("✨", Point::new(100.0, 50.0)),
        ("💝", Point::new(width - 100.0, 50.0)),
        ("🌸", Point::new(80.0, height - 70.0)),
        ("🦋", Point::new(width - 80.0, height - 70.0)),
        ("🌈", Point::new(width / 2.0, height - 50.0)),
    ];
    for (sticker, at) in stickers {
        canvas.text(
            sticker,
            Point::new(at.x + 3.0, at.y + 3.0),
            &TextStyle::new(60.0, "rgba(0, 0, 0, 0.2)"),
        );
        canvas.text(sticker, at, &TextStyle::new(60.0, "#ffffff"));
    }

    canvas.text(
        "Daybook ♥",
        Point::new(width / 2.0, height - 30.0),
        &TextStyle::new(24.0, "rgba(255, 255, 255, 0.5)"),
    );
}

fn draw_header(canvas: &mut dyn Canvas, width: f64, date_string: &str) {
    canvas.rounded_rect(
        Rect::new(50.0, 100.0, width - 100.0, 200.0),
        30.0,
        "rgba(255, 255, 255, 0.9)",
    );
    // "Monday, October 19, 2026" splits into weekday and the rest.
    match date_string.split_once(',') {
        Some((weekday, rest)) => {
            canvas.text(
                weekday,
                Point::new(width / 2.0, 160.0),
                &TextStyle::new(48.0, "#764ba2").bold(),
            );
            canvas.text(
                rest.trim(),
                Point::new(width / 2.0, 230.0),
                &TextStyle::new(60.0, "#764ba2").bold(),
            );
        }
        None => canvas.text(
            date_string,
            Point::new(width / 2.0, 200.0),
            &TextStyle::new(72.0, "#764ba2").bold(),
        ),
    }
}

pub fn render_svg(day: &DayExport<'_>) -> String {
    let mut canvas = SvgCanvas::new(WIDTH, HEIGHT);
    compose(&mut canvas, day);
    canvas.finish()
}

/// The day as a 1080×1920 JPEG.
pub fn render_jpeg(day: &DayExport<'_>) -> Result<Vec<u8>, RasterError> {
    rasterize(&render_svg(day))
}

pub fn rasterize(svg: &str) -> Result<Vec<u8>, RasterError> {
    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &options)?;
    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());
    let mut pixmap =
        tiny_skia::Pixmap::new(width, height).ok_or(RasterError::Allocate(width, height))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // The gradient background is opaque, so premultiplied pixels are plain RGBA.
    let rgba = RgbaImage::from_raw(width, height, pixmap.take())
        .ok_or(RasterError::Allocate(width, height))?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
    let mut jpeg = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::model::ContentItem;

    #[derive(Default)]
    struct Recorder {
        texts: Vec<(String, Point)>,
        images: Vec<Rect>,
        rounded: Vec<Rect>,
        lines: usize,
    }

    impl Canvas for Recorder {
        fn size(&self) -> (f64, f64) {
            (WIDTH, HEIGHT)
        }
        fn linear_gradient(&mut self, _stops: &[(f64, &str)]) {}
        fn line(&mut self, _from: Point, _to: Point, _color: &str, _width: f64, _opacity: f64) {
            self.lines += 1;
        }
        fn rect(&mut self, _rect: Rect, _fill: &str) {}
        fn rounded_rect(&mut self, rect: Rect, _radius: f64, _fill: &str) {
            self.rounded.push(rect);
        }
        fn text(&mut self, text: &str, at: Point, _style: &TextStyle) {
            self.texts.push((text.to_string(), at));
        }
        fn image(&mut self, rect: Rect, _href: &str) {
            self.images.push(rect);
        }
        fn measure_text(&self, text: &str, style: &TextStyle) -> f64 {
            text.chars().count() as f64 * style.size * 0.5
        }
    }

    fn draw(items: &[ContentItem], with_location: bool) -> Recorder {
        let refs: Vec<&ContentItem> = items.iter().collect();
        let day = DayExport::new(day(), &refs, with_location.then(location));
        let mut recorder = Recorder::default();
        compose(&mut recorder, &day);
        recorder
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text("aaa bbb ccc ddd", 7.0, |s| s.chars().count() as f64);
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
        let long = wrap_text("supercalifragilistic word", 5.0, |s| s.chars().count() as f64);
        assert_eq!(long, vec!["supercalifragilistic", "word"]);
        assert!(wrap_text("   ", 10.0, |s| s.len() as f64).is_empty());
    }

    #[test]
    fn header_splits_weekday() {
        let recorder = draw(&[], false);
        let texts: Vec<&str> = recorder.texts.iter().map(|(t, _)| t.as_str()).collect();
        assert!(texts.contains(&"Monday"));
        assert!(texts.contains(&"October 19, 2026"));
        assert!(texts.contains(&"Daybook ♥"));
        assert_eq!(recorder.lines, ((WIDTH + HEIGHT) / PATTERN_SPACING).ceil() as usize);
    }

    #[test]
    fn photo_grid_caps_at_four() {
        let items: Vec<ContentItem> = (0..6).map(photo).collect();
        let recorder = draw(&items, false);
        assert_eq!(recorder.images.len(), 4);
        assert_eq!(recorder.images[0].x, 130.0);
        assert_eq!(recorder.images[3], Rect::new(550.0, 1220.0, 400.0, 400.0));
    }

    #[test]
    fn verse_wraps_inside_card() {
        let recorder = draw(&[verse()], false);
        let verse_lines: Vec<&(String, Point)> = recorder
            .texts
            .iter()
            .filter(|(_, at)| at.y >= 530.0 && at.y < 760.0)
            .collect();
        assert!(verse_lines.len() >= 2);
        for (text, _) in verse_lines {
            assert!(text.chars().count() as f64 * 16.0 <= WIDTH - 150.0);
        }
    }

    #[test]
    fn location_card_only_with_location() {
        let without = draw(&[], false);
        assert!(!without.texts.iter().any(|(t, _)| t == "📍"));
        let with = draw(&[], true);
        assert!(with.texts.iter().any(|(t, _)| t == "Bangkok, Thailand"));
    }

    #[test]
    fn notes_overflow_is_summarised() {
        let recorder = draw(&[note("one"), note("two"), note("three")], false);
        assert!(recorder.texts.iter().any(|(t, _)| t == "• one"));
        assert!(recorder.texts.iter().any(|(t, _)| t == "+1 more notes..."));
        assert!(!recorder.texts.iter().any(|(t, _)| t == "• three"));
    }

    #[test]
    fn svg_output_is_well_formed_and_escaped() {
        let items = vec![note("fish & chips <3")];
        let refs: Vec<&ContentItem> = items.iter().collect();
        let svg = render_svg(&DayExport::new(day(), &refs, None));
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("width=\"1080\" height=\"1920\""));
        assert!(svg.contains("fish &amp; chips &lt;3"));
    }

    #[test]
    fn jpeg_has_the_poster_size() {
        let items = vec![note("rainy"), verse()];
        let refs: Vec<&ContentItem> = items.iter().collect();
        let jpeg = render_jpeg(&DayExport::new(day(), &refs, Some(location()))).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = ::image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1080, 1920));
    }
}
