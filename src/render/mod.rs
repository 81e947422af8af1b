//! Macroquad adapter: textures for every image a map references, tile
//! surfaces and layer drawing.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};

use anyhow::Context;
use macroquad::prelude::*;
use tracing::debug;

use crate::gid::{Flip, TileRef};
use crate::layer::{ImageLayer, Layer, TileLayer};
use crate::map::Map;
use crate::properties;
use crate::tileset::Tile;

/// A tile's graphic: the texture it lives in and its source rectangle.
pub struct TileSurface<'a> {
    pub tile: &'a Tile,
    pub texture: &'a Texture2D,
    /// `None` when the tile owns the whole texture.
    pub source: Option<Rect>,
    pub flip: Flip,
}

impl TileSurface<'_> {
    /// Draws the tile with its top-left corner at `(x, y)`.
    pub fn draw(&self, x: f32, y: f32, tint: Color) {
        let size = self
            .source
            .map(|r| vec2(r.w, r.h))
            .unwrap_or_else(|| self.texture.size());
        draw_texture_ex(self.texture, x, y, tint, flip_params(self.flip, self.source, size));
    }
}

fn flip_params(flip: Flip, source: Option<Rect>, size: Vec2) -> DrawTextureParams {
    let mut params = DrawTextureParams {
        source,
        dest_size: Some(size),
        flip_x: flip.horizontal,
        flip_y: flip.vertical,
        ..Default::default()
    };
    // anti-diagonal flip: quarter turn plus a mirror
    if flip.diagonal {
        params.rotation = FRAC_PI_2;
        params.flip_x = flip.vertical;
        params.flip_y = !flip.horizontal;
    }
    params
}

/// Converts a document color.
pub fn to_color(c: properties::Color) -> Color {
    Color::from_rgba(c.red, c.green, c.blue, c.alpha)
}

/// Textures for tileset atlases, image-collection tiles and image layers,
/// loaded once per distinct file.
pub struct Surfaces {
    textures: HashMap<PathBuf, Texture2D>,
}

async fn texture(path: &Path) -> anyhow::Result<Texture2D> {
    let name = path
        .to_str()
        .with_context(|| format!("Texture path is not UTF-8: {}", path.display()))?;
    let tex = load_texture(name)
        .await
        .with_context(|| format!("Loading texture {}", path.display()))?;
    tex.set_filter(FilterMode::Nearest);
    Ok(tex)
}

impl Surfaces {
    pub async fn load(map: &Map) -> anyhow::Result<Self> {
        let mut paths: Vec<&Path> = Vec::new();
        for ts in &map.tilesets {
            paths.extend(ts.image.as_ref().map(|i| i.source.as_path()));
            paths.extend(ts.tiles.iter().filter_map(|t| t.image.as_ref()).map(|i| i.source.as_path()));
        }
        for (_, layer) in map.all_layers() {
            if let Layer::Image(ImageLayer { image: Some(img), .. }) = layer {
                paths.push(&img.source);
            }
        }

        let mut textures = HashMap::new();
        for path in paths {
            if textures.contains_key(path) {
                continue;
            }
            debug!(path = %path.display(), "loading texture");
            textures.insert(path.to_path_buf(), texture(path).await?);
        }
        Ok(Self { textures })
    }

    pub fn texture(&self, path: &Path) -> Option<&Texture2D> {
        self.textures.get(path)
    }

    /// Graphic of a placed tile, if its image was loaded.
    pub fn tile_surface<'a>(&'a self, map: &'a Map, tile: &TileRef) -> Option<TileSurface<'a>> {
        let ts = map.tileset_of(tile)?;
        let record = ts.tile(tile.local_id)?;
        if let Some(own) = &record.image {
            return Some(TileSurface {
                tile: record,
                texture: self.textures.get(&own.source)?,
                source: None,
                flip: tile.flip,
            });
        }
        let rect = ts.tile_rect(tile.local_id)?;
        Some(TileSurface {
            tile: record,
            texture: self.textures.get(&ts.image.as_ref()?.source)?,
            source: Some(Rect::new(
                rect.x as f32,
                rect.y as f32,
                rect.width as f32,
                rect.height as f32,
            )),
            flip: tile.flip,
        })
    }

    /// Draws the cells of `layer` that fall inside `[view_min, view_max]`,
    /// in world pixels.
    pub fn draw_tile_layer(&self, map: &Map, layer: &TileLayer, view_min: Vec2, view_max: Vec2) {
        if !layer.info.effective_visible {
            return;
        }
        let offset = vec2(layer.info.effective_offset.x, layer.info.effective_offset.y);
        let tint = Color::new(1.0, 1.0, 1.0, layer.info.effective_opacity);
        let (tw, th) = (map.tile_width as i32, map.tile_height as i32);
        if tw == 0 || th == 0 {
            return;
        }
        let min = view_min - offset;
        let max = view_max - offset;
        let (x0, y0) = ((min.x as i32).div_euclid(tw), (min.y as i32).div_euclid(th));
        let (x1, y1) = ((max.x as i32).div_euclid(tw), (max.y as i32).div_euclid(th));

        for y in y0..=y1 {
            for x in x0..=x1 {
                let Some(cell) = layer.get(x, y) else {
                    continue;
                };
                let Some(surface) = self.tile_surface(map, cell) else {
                    continue;
                };
                let ts_offset = map
                    .tileset_of(cell)
                    .map(|ts| vec2(ts.tile_offset.x, ts.tile_offset.y))
                    .unwrap_or_default();
                // tiles taller than the grid grow upwards from the cell's bottom
                let height = surface.source.map_or(surface.texture.height(), |r| r.h);
                let pos = offset
                    + ts_offset
                    + vec2((x * tw) as f32, ((y + 1) * th) as f32 - height);
                surface.draw(pos.x, pos.y, tint);
            }
        }
    }

    /// Draws every visible tile and image layer in document order.
    pub fn draw_map(&self, map: &Map, view_min: Vec2, view_max: Vec2) {
        for (_, layer) in map.all_layers() {
            match layer {
                Layer::Tiles(l) => self.draw_tile_layer(map, l, view_min, view_max),
                Layer::Image(l) if l.info.effective_visible => {
                    let Some(tex) = l.image.as_ref().and_then(|i| self.texture(&i.source)) else {
                        continue;
                    };
                    let tint = Color::new(1.0, 1.0, 1.0, l.info.effective_opacity);
                    let off = l.info.effective_offset;
                    draw_texture(tex, off.x, off.y, tint);
                }
                _ => {}
            }
        }
    }
}
