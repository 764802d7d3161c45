//! Tile layouts - the static shape of a world before anything is spawned.

use colonysim_logic::{GridPos, TileGrid};

use crate::error::TemplateError;
use crate::templates::Templates;

/// Row-major tile template names plus their accessibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldLayout {
    width: u32,
    height: u32,
    kinds: Vec<String>,
    accessible: Vec<bool>,
}

impl WorldLayout {
    /// Build a layout from an ASCII map, one glyph per tile. Leading and
    /// trailing blank lines are ignored; every row must have the same width.
    pub fn parse(map: &str, templates: &Templates) -> Result<Self, TemplateError> {
        let rows: Vec<&str> = map
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let Some(first) = rows.first() else {
            return Err(TemplateError::EmptyLayout);
        };
        let width = first.chars().count();

        let mut kinds = Vec::with_capacity(width * rows.len());
        let mut accessible = Vec::with_capacity(width * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(TemplateError::RaggedLayout {
                    row,
                    expected: width,
                    found,
                });
            }
            for glyph in line.chars() {
                let (name, tile) = templates
                    .tile_for_glyph(glyph)
                    .ok_or(TemplateError::UnknownGlyph(glyph))?;
                kinds.push(name.to_string());
                accessible.push(tile.accessible);
            }
        }

        Ok(Self {
            width: width as u32,
            height: rows.len() as u32,
            kinds,
            accessible,
        })
    }

    /// Build a layout from an accessibility function, using the first
    /// open and closed tile templates by name.
    pub fn from_fn(
        width: u32,
        height: u32,
        templates: &Templates,
        mut accessible: impl FnMut(GridPos) -> bool,
    ) -> Result<Self, TemplateError> {
        if width == 0 || height == 0 {
            return Err(TemplateError::EmptyLayout);
        }
        let open = templates
            .tile_with_access(true)
            .ok_or(TemplateError::NoTileTemplate(true))?;
        let closed = templates
            .tile_with_access(false)
            .ok_or(TemplateError::NoTileTemplate(false))?;

        let mut layout = Self {
            width,
            height,
            kinds: Vec::with_capacity((width * height) as usize),
            accessible: Vec::with_capacity((width * height) as usize),
        };
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let open_here = accessible(GridPos::new(x, y));
                layout
                    .kinds
                    .push(if open_here { open } else { closed }.to_string());
                layout.accessible.push(open_here);
            }
        }
        Ok(layout)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        let inside =
            pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height;
        inside.then(|| (pos.y as u32 * self.width + pos.x as u32) as usize)
    }

    pub fn is_accessible(&self, pos: GridPos) -> bool {
        self.index(pos)
            .and_then(|i| self.accessible.get(i))
            .copied()
            .unwrap_or(false)
    }

    /// Tile template name at `pos`.
    pub fn tile_kind(&self, pos: GridPos) -> Option<&str> {
        self.index(pos)
            .and_then(|i| self.kinds.get(i))
            .map(String::as_str)
    }

    /// Replace the tile at `pos`. Returns false when out of bounds.
    pub fn set_tile(&mut self, pos: GridPos, kind: &str, accessible: bool) -> bool {
        let Some(i) = self.index(pos) else {
            return false;
        };
        self.kinds[i] = kind.to_string();
        self.accessible[i] = accessible;
        true
    }

    pub fn open_tiles(&self) -> impl Iterator<Item = GridPos> + '_ {
        let width = self.width as i32;
        self.accessible
            .iter()
            .enumerate()
            .filter(|(_, open)| **open)
            .map(move |(i, _)| GridPos::new(i as i32 % width, i as i32 / width))
    }

    /// The runtime grid for this layout. Areas are not yet assigned.
    pub fn to_grid(&self) -> TileGrid {
        TileGrid::from_fn(self.width, self.height, |pos| self.is_accessible(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> Templates {
        Templates::builtin().unwrap()
    }

    #[test]
    fn test_parse_map() {
        let layout = WorldLayout::parse(
            "
            ###
            #.,
            ",
            &templates(),
        )
        .unwrap();
        assert_eq!((layout.width(), layout.height()), (3, 2));
        assert!(!layout.is_accessible(GridPos::new(0, 0)));
        assert!(layout.is_accessible(GridPos::new(1, 1)));
        assert_eq!(layout.tile_kind(GridPos::new(2, 1)), Some("grass"));
        assert_eq!(layout.open_tiles().count(), 2);

        let grid = layout.to_grid();
        assert!(grid.is_accessible(GridPos::new(2, 1)));
        assert!(!grid.is_accessible(GridPos::new(2, 0)));
    }

    #[test]
    fn test_parse_errors() {
        let t = templates();
        assert!(matches!(
            WorldLayout::parse("\n  \n", &t),
            Err(TemplateError::EmptyLayout)
        ));
        assert!(matches!(
            WorldLayout::parse("...\n..", &t),
            Err(TemplateError::RaggedLayout { row: 1, expected: 3, found: 2 })
        ));
        assert!(matches!(
            WorldLayout::parse(".x.", &t),
            Err(TemplateError::UnknownGlyph('x'))
        ));
    }

    #[test]
    fn test_from_fn_picks_templates_by_name() {
        let layout = WorldLayout::from_fn(2, 1, &templates(), |p| p.x == 0).unwrap();
        assert_eq!(layout.tile_kind(GridPos::new(0, 0)), Some("floor"));
        assert_eq!(layout.tile_kind(GridPos::new(1, 0)), Some("rock"));
        assert_eq!(layout.tile_kind(GridPos::new(5, 0)), None);
    }
}
