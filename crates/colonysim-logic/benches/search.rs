use colonysim_logic::{GridPos, PathfindRequest, Pathfinder, SpatialTree, TileGrid};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A 128x128 map with vertical wall strips that leave a gap at alternating ends.
fn maze() -> TileGrid {
    TileGrid::from_fn(128, 128, |p| {
        if p.x % 8 != 4 {
            return true;
        }
        if (p.x / 8) % 2 == 0 {
            p.y == 127
        } else {
            p.y == 0
        }
    })
}

fn bench_pathfinder(c: &mut Criterion) {
    let grid = maze();
    let mut pf = Pathfinder::new();
    c.bench_function("astar_maze_128", |b| {
        b.iter(|| {
            pf.new_search(PathfindRequest::to_point(
                GridPos::new(0, 0),
                GridPos::new(127, 127),
                0,
            ));
            black_box(pf.run_to_completion(&grid))
        })
    });
}

fn bench_spatial(c: &mut Criterion) {
    let mut tree: SpatialTree<u8, u32> = SpatialTree::initialise(256, 256, &[4, 4, 4]).unwrap();
    for i in 0..2_000u32 {
        let pos = GridPos::new((i * 37 % 256) as i32, (i * 91 % 256) as i32);
        tree.add(pos, (i % 3) as u8, i).unwrap();
    }
    c.bench_function("spatial_find_closest", |b| {
        b.iter(|| black_box(tree.find_closest(GridPos::new(128, 17), &1)))
    });
}

criterion_group!(benches, bench_pathfinder, bench_spatial);
criterion_main!(benches);
