//! Cave generation - seeded cellular-automaton caverns.

use colonysim_logic::GridPos;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::WorldLayout;
use crate::error::TemplateError;
use crate::templates::Templates;

/// Configuration for cave generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    pub width: u32,
    pub height: u32,
    /// Chance that a cell starts as rock before smoothing.
    pub wall_chance: f64,
    pub smoothing_passes: u32,
    pub seed: u64,
}

impl Default for CaveConfig {
    fn default() -> Self {
        Self {
            width: 48,
            height: 32,
            wall_chance: 0.42,
            smoothing_passes: 3,
            seed: 7,
        }
    }
}

/// Count rock cells in the 8-neighbourhood. Cells outside the map count as rock.
fn rock_neighbours(open: &[bool], width: i32, height: i32, x: i32, y: i32) -> u32 {
    let mut count = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (nx, ny) = (x + dx, y + dy);
            let inside = nx >= 0 && ny >= 0 && nx < width && ny < height;
            if !inside || !open[(ny * width + nx) as usize] {
                count += 1;
            }
        }
    }
    count
}

/// Generate a cave layout. The same config always yields the same layout.
pub fn generate_cave(config: &CaveConfig, templates: &Templates) -> Result<WorldLayout, TemplateError> {
    if config.width == 0 || config.height == 0 {
        return Err(TemplateError::EmptyLayout);
    }
    let mut rng = StdRng::seed_from_u64(config.seed);
    let width = config.width as i32;
    let height = config.height as i32;
    let wall_chance = config.wall_chance.clamp(0.0, 1.0);
    let on_border = |x: i32, y: i32| x == 0 || y == 0 || x == width - 1 || y == height - 1;

    let mut open: Vec<bool> = (0..width * height)
        .map(|i| !on_border(i % width, i / width) && !rng.gen_bool(wall_chance))
        .collect();

    for _ in 0..config.smoothing_passes {
        let mut next = open.clone();
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                if on_border(x, y) {
                    next[idx] = false;
                    continue;
                }
                match rock_neighbours(&open, width, height, x, y) {
                    0..=3 => next[idx] = true,
                    5..=8 => next[idx] = false,
                    _ => {}
                }
            }
        }
        open = next;
    }

    let layout = WorldLayout::from_fn(config.width, config.height, templates, |pos: GridPos| {
        open[(pos.y * width + pos.x) as usize]
    })?;
    log::info!(
        "Generated {}x{} cave (seed {}) with {} open tiles",
        config.width,
        config.height,
        config.seed,
        layout.open_tiles().count()
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cave_is_deterministic_and_walled() {
        let templates = Templates::builtin().unwrap();
        let config = CaveConfig {
            width: 20,
            height: 12,
            seed: 99,
            ..Default::default()
        };
        let a = generate_cave(&config, &templates).unwrap();
        let b = generate_cave(&config, &templates).unwrap();
        assert_eq!(a, b);

        for x in 0..20 {
            assert!(!a.is_accessible(GridPos::new(x, 0)));
            assert!(!a.is_accessible(GridPos::new(x, 11)));
        }
        for y in 0..12 {
            assert!(!a.is_accessible(GridPos::new(0, y)));
            assert!(!a.is_accessible(GridPos::new(19, y)));
        }
    }

    #[test]
    fn test_empty_cave_rejected() {
        let templates = Templates::builtin().unwrap();
        let config = CaveConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(
            generate_cave(&config, &templates),
            Err(TemplateError::EmptyLayout)
        ));
    }
}
