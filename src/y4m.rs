//! YUV4MPEG2 (`.y4m`) stream codec.
//!
//! Uncompressed planar YUV with a one-line text header, readable and
//! writable by ffmpeg and most players. Used as the default file format for
//! both the input and the annotated output, so a run needs no native codec
//! libraries.
//!
//! Supported: 8-bit 4:2:0 (all siting variants), 4:2:2, 4:4:4 and mono.
//! Conversion uses BT.601 studio-range coefficients.

use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use std::io::{BufRead, Read, Write};

const STREAM_MAGIC: &str = "YUV4MPEG2";
const FRAME_MAGIC: &[u8] = b"FRAME";
const MAX_HEADER_BYTES: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Colorspace {
    C420,
    C422,
    C444,
    Mono,
}

impl Colorspace {
    fn parse(tag: &str) -> Result<Self> {
        match tag {
            "420" | "420jpeg" | "420paldv" | "420mpeg2" => Ok(Colorspace::C420),
            "422" => Ok(Colorspace::C422),
            "444" => Ok(Colorspace::C444),
            "mono" => Ok(Colorspace::Mono),
            other => Err(anyhow!("unsupported y4m colorspace C{}", other)),
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Colorspace::C420 => "420jpeg",
            Colorspace::C422 => "422",
            Colorspace::C444 => "444",
            Colorspace::Mono => "mono",
        }
    }

    /// Chroma plane dimensions, or `None` for mono.
    fn chroma_dims(self, width: usize, height: usize) -> Option<(usize, usize)> {
        match self {
            Colorspace::C420 => Some((width.div_ceil(2), height.div_ceil(2))),
            Colorspace::C422 => Some((width.div_ceil(2), height)),
            Colorspace::C444 => Some((width, height)),
            Colorspace::Mono => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Y4mHeader {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub colorspace: Colorspace,
}

impl Y4mHeader {
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            return 0.0;
        }
        self.fps_num as f64 / self.fps_den as f64
    }

    fn frame_bytes(&self) -> usize {
        let (w, h) = (self.width as usize, self.height as usize);
        let chroma = self
            .colorspace
            .chroma_dims(w, h)
            .map(|(cw, ch)| 2 * cw * ch)
            .unwrap_or(0);
        w * h + chroma
    }

    fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.split_ascii_whitespace();
        if tokens.next() != Some(STREAM_MAGIC) {
            bail!("missing {} signature", STREAM_MAGIC);
        }
        let mut width = None;
        let mut height = None;
        let mut fps = None;
        let mut colorspace = Colorspace::C420;
        for token in tokens {
            if !token.is_char_boundary(1) {
                bail!("invalid y4m header token {}", token);
            }
            let (key, value) = token.split_at(1);
            match key {
                "W" => width = Some(value.parse::<u32>().context("invalid y4m width")?),
                "H" => height = Some(value.parse::<u32>().context("invalid y4m height")?),
                "F" => {
                    let (num, den) = value
                        .split_once(':')
                        .ok_or_else(|| anyhow!("invalid y4m frame rate {}", value))?;
                    fps = Some((
                        num.parse::<u32>().context("invalid y4m frame rate")?,
                        den.parse::<u32>().context("invalid y4m frame rate")?,
                    ));
                }
                "C" => colorspace = Colorspace::parse(value)?,
                // interlacing, aspect ratio and extensions do not affect decoding
                _ => {}
            }
        }
        let width = width.ok_or_else(|| anyhow!("y4m header has no width"))?;
        let height = height.ok_or_else(|| anyhow!("y4m header has no height"))?;
        if width == 0 || height == 0 {
            bail!("y4m frame size must be non-zero");
        }
        let (fps_num, fps_den) = fps.ok_or_else(|| anyhow!("y4m header has no frame rate"))?;
        if fps_num == 0 || fps_den == 0 {
            bail!("y4m frame rate must be non-zero");
        }
        Ok(Self {
            width,
            height,
            fps_num,
            fps_den,
            colorspace,
        })
    }

    fn render(&self) -> String {
        format!(
            "{} W{} H{} F{}:{} Ip A1:1 C{}\n",
            STREAM_MAGIC,
            self.width,
            self.height,
            self.fps_num,
            self.fps_den,
            self.colorspace.tag()
        )
    }
}

/// Streaming y4m decoder producing RGB images.
pub struct Y4mReader<R: BufRead> {
    inner: R,
    header: Y4mHeader,
    buf: Vec<u8>,
}

impl<R: BufRead> Y4mReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let line = read_line(&mut inner)?.ok_or_else(|| anyhow!("empty y4m stream"))?;
        let header = Y4mHeader::parse(&line)?;
        let buf = vec![0u8; header.frame_bytes()];
        Ok(Self { inner, header, buf })
    }

    pub fn header(&self) -> &Y4mHeader {
        &self.header
    }

    /// Decode the next frame. `Ok(None)` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(line) = read_line(&mut self.inner)? else {
            return Ok(None);
        };
        if !line.as_bytes().starts_with(FRAME_MAGIC) {
            bail!("expected y4m FRAME marker");
        }
        self.inner
            .read_exact(&mut self.buf)
            .context("truncated y4m frame")?;
        Ok(Some(planes_to_rgb(&self.header, &self.buf)))
    }
}

/// Streaming y4m encoder. Frames are written as 4:4:4.
pub struct Y4mWriter<W: Write> {
    inner: W,
    header: Y4mHeader,
    frames: u64,
}

impl<W: Write> Y4mWriter<W> {
    pub fn new(mut inner: W, width: u32, height: u32, fps: (u32, u32)) -> Result<Self> {
        let header = Y4mHeader {
            width,
            height,
            fps_num: fps.0.max(1),
            fps_den: fps.1.max(1),
            colorspace: Colorspace::C444,
        };
        inner.write_all(header.render().as_bytes())?;
        Ok(Self {
            inner,
            header,
            frames: 0,
        })
    }

    pub fn header(&self) -> &Y4mHeader {
        &self.header
    }

    pub fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if image.width() != self.header.width || image.height() != self.header.height {
            bail!(
                "frame size {}x{} does not match stream size {}x{}",
                image.width(),
                image.height(),
                self.header.width,
                self.header.height
            );
        }
        let plane = (self.header.width * self.header.height) as usize;
        let mut data = vec![0u8; plane * 3];
        for (i, px) in image.pixels().enumerate() {
            let (y, u, v) = rgb_to_yuv(px.0);
            data[i] = y;
            data[plane + i] = u;
            data[2 * plane + i] = v;
        }
        self.inner.write_all(b"FRAME\n")?;
        self.inner.write_all(&data)?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_HEADER_BYTES as u64)
        .read_until(b'\n', &mut line)?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        bail!("unterminated y4m header line");
    }
    line.pop();
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| anyhow!("y4m header is not ASCII"))
}

fn planes_to_rgb(header: &Y4mHeader, data: &[u8]) -> RgbImage {
    let (w, h) = (header.width as usize, header.height as usize);
    let luma = &data[..w * h];
    let chroma = header.colorspace.chroma_dims(w, h);
    RgbImage::from_fn(header.width, header.height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let yy = luma[y * w + x];
        let (u, v) = match chroma {
            Some((cw, ch)) => {
                let cx = x * cw / w;
                let cy = y * ch / h;
                let u_plane = &data[w * h..w * h + cw * ch];
                let v_plane = &data[w * h + cw * ch..];
                (u_plane[cy * cw + cx], v_plane[cy * cw + cx])
            }
            None => (128, 128),
        };
        image::Rgb(yuv_to_rgb(yy, u, v))
    })
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

pub(crate) fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 1.164 * (y as f32 - 16.0);
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    [
        clamp_u8(c + 1.596 * e),
        clamp_u8(c - 0.392 * d - 0.813 * e),
        clamp_u8(c + 2.017 * d),
    ]
}

pub(crate) fn rgb_to_yuv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    (
        clamp_u8(16.0 + 0.257 * r + 0.504 * g + 0.098 * b),
        clamp_u8(128.0 - 0.148 * r - 0.291 * g + 0.439 * b),
        clamp_u8(128.0 + 0.439 * r - 0.368 * g - 0.071 * b),
    )
}
