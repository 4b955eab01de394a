//! Display adapter used by sensors and the alert overlay
//!
//! Sensors never talk to the panel directly. They draw lines of text onto a
//! [`TextSurface`], which the station clears at the start of each tick and
//! flushes at the end. [`DisplayManager`] is the production surface: it
//! renders into a [`FrameBuffer`] and pushes the changed region to any
//! `embedded-graphics` panel.

use core::fmt::Debug;

use embedded_graphics::Drawable;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_9X15, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::{error, info};

use crate::framebuffer::FrameBuffer;

/// Panel width in portrait orientation.
pub const DISPLAY_WIDTH_PX: u16 = 240;

/// Panel height in portrait orientation.
pub const DISPLAY_HEIGHT_PX: u16 = 320;

/// Glyph size for [`TextSurface::draw_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSize {
    /// 6x10 glyphs, used for alert labels
    Small,
    /// 9x15 glyphs, used for measurement lines
    Medium,
    /// 10x20 glyphs
    Large,
}

impl TextSize {
    const fn font(self) -> &'static MonoFont<'static> {
        match self {
            Self::Small => &FONT_6X10,
            Self::Medium => &FONT_9X15,
            Self::Large => &FONT_10X20,
        }
    }
}

/// The drawing operations the station needs from a screen.
pub trait TextSurface {
    /// Blank the whole surface.
    fn clear(&mut self);

    /// Draw `text` with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: TextSize);

    /// Make everything drawn since the last flush visible.
    fn flush(&mut self);
}

/// Framebuffer-backed text surface for an `Rgb565` panel.
pub struct DisplayManager<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    display: D,
    frame: FrameBuffer,
    foreground: Rgb565,
    background: Rgb565,
}

impl<D> DisplayManager<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    /// Wrap `display`, allocating a framebuffer that matches its size.
    pub fn new(display: D) -> Self {
        let size = display.bounding_box().size;
        info!("Display manager ready ({}x{})", size.width, size.height);

        Self {
            display,
            frame: FrameBuffer::new(size),
            foreground: Rgb565::WHITE,
            background: Rgb565::BLACK,
        }
    }

    /// The framebuffer contents that the next flush will show.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// The panel this manager draws to.
    pub fn target(&self) -> &D {
        &self.display
    }

    /// Give back the panel.
    pub fn into_inner(self) -> D {
        self.display
    }
}

impl<D> TextSurface for DisplayManager<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: Debug,
{
    fn clear(&mut self) {
        let Ok(()) = self.frame.clear(self.background);
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: TextSize) {
        let style = MonoTextStyle::new(size.font(), self.foreground);
        let Ok(_) = Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
            .draw(&mut self.frame);
    }

    fn flush(&mut self) {
        if let Err(e) = self.frame.flush(&mut self.display) {
            error!("Display flush failed: {:?}", e);
        }
    }
}
