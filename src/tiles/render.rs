//! Read-only view of the cache for a render pass

use crate::{
    core::geo::TileId,
    tiles::{
        coverage::CoverageEngine,
        tile::{Tile, TileState},
    },
    traits::Configurable,
};

/// A tile handed to the renderer for the duration of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTile<'a> {
    pub id: TileId,
    pub state: TileState,
    /// Content of a ready tile; `None` for pending tiles in debug mode
    pub payload: Option<&'a [u8]>,
}

impl<'a> From<&'a Tile> for RenderTile<'a> {
    fn from(tile: &'a Tile) -> Self {
        Self {
            id: tile.id(),
            state: tile.state(),
            payload: tile.payload(),
        }
    }
}

/// Produces the draw list, most detailed zoom first.
///
/// In debug mode pending tiles are included as well, so their outlines can
/// be drawn.
pub struct RenderSelector<'a> {
    engine: &'a CoverageEngine,
}

impl<'a> RenderSelector<'a> {
    pub fn new(engine: &'a CoverageEngine) -> Self {
        Self { engine }
    }

    pub fn tiles(&self) -> Vec<RenderTile<'a>> {
        let engine = self.engine;
        if engine.config().debug {
            engine
                .render_order()
                .iter()
                .filter_map(|id| engine.tile(id))
                .map(RenderTile::from)
                .collect()
        } else {
            engine
                .tiles_for_render()
                .into_iter()
                .map(RenderTile::from)
                .collect()
        }
    }
}
