//! Time-sliced searches over a [`GridDomain`].
//!
//! Both searches follow the same contract: start with `new_search` /
//! `new_fill`, then call `step(domain, max_iterations)` as many times as
//! needed, typically once per scheduler tick. A call never performs more
//! than `max_iterations` node expansions. Once a search reports
//! `Succeeded` or `Failed`, further `step` calls return the same state
//! without touching the result.
//!
//! * [`Pathfinder`]: A* with Manhattan heuristic, single or multi goal.
//! * [`FillFinder`]: zero-cost flood from a start position, no goal.
//!
//! Multi-goal searches use the Manhattan distance to the bounding
//! rectangle of the goal set as heuristic. With step costs of at least one
//! it never overestimates and stays consistent, so the member reached is
//! one of the cheapest. It is looser than a per-member estimate and may
//! expand more nodes.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::grid::{axis_gap, Direction, GridDomain, GridPos};

/// Progress of an incremental search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    NotInitialised,
    Searching,
    Succeeded,
    Failed,
}

impl SearchState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SearchState::Succeeded | SearchState::Failed)
    }
}

/// Where a path may end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
    Point(GridPos),
    AnyOf(BTreeSet<GridPos>),
}

impl Goal {
    pub fn contains(&self, pos: GridPos) -> bool {
        match self {
            Goal::Point(p) => *p == pos,
            Goal::AnyOf(set) => set.contains(&pos),
        }
    }

    fn estimate(&self, from: GridPos, bounds: Option<(GridPos, GridPos)>) -> u32 {
        match self {
            Goal::Point(p) => from.manhattan(*p),
            Goal::AnyOf(_) => match bounds {
                Some((lo, hi)) => {
                    let dx = axis_gap(from.x, lo.x, hi.x);
                    let dy = axis_gap(from.y, lo.y, hi.y);
                    dx + dy
                }
                None => 0,
            },
        }
    }

    /// Bounding rectangle of a goal set, `None` for a single point or an
    /// empty set.
    fn bounds(&self) -> Option<(GridPos, GridPos)> {
        let Goal::AnyOf(set) = self else {
            return None;
        };
        let first = set.iter().next()?;
        let mut lo = *first;
        let mut hi = *first;
        for p in set {
            lo.x = lo.x.min(p.x);
            lo.y = lo.y.min(p.y);
            hi.x = hi.x.max(p.x);
            hi.y = hi.y.max(p.y);
        }
        Some((lo, hi))
    }
}

/// Immutable description of one path query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathfindRequest {
    pub start: GridPos,
    pub goal: Goal,
    /// Correlation id of whoever asked. Never interpreted by the search.
    pub requester: u64,
}

impl PathfindRequest {
    pub fn to_point(start: GridPos, goal: GridPos, requester: u64) -> Self {
        Self {
            start,
            goal: Goal::Point(goal),
            requester,
        }
    }

    pub fn to_any(
        start: GridPos,
        goals: impl IntoIterator<Item = GridPos>,
        requester: u64,
    ) -> Self {
        Self {
            start,
            goal: Goal::AnyOf(goals.into_iter().collect()),
            requester,
        }
    }
}

/// Directions from the request's start to the goal that was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub directions: Vec<Direction>,
    pub goal: GridPos,
    pub requester: u64,
}

#[derive(Debug, Clone)]
struct SearchNode {
    pos: GridPos,
    g: u32,
    h: u32,
    f: u32,
    parent: Option<usize>,
    /// Direction taken from `parent` to get here.
    dir: Option<Direction>,
    closed: bool,
}

/// Heap entry. Lowest `f` first, then arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    f: u32,
    seq: u64,
    node: usize,
    g: u32,
}

/// Incremental A* search.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    request: Option<PathfindRequest>,
    goal_bounds: Option<(GridPos, GridPos)>,
    nodes: Vec<SearchNode>,
    index: HashMap<GridPos, usize>,
    open: BinaryHeap<Reverse<OpenEntry>>,
    /// Number of nodes currently open. The heap may also hold stale entries.
    open_count: usize,
    seq: u64,
    state: SearchState,
    result: Option<PathResult>,
    expansions: usize,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Pathfinder {
    pub fn new() -> Self {
        Self {
            request: None,
            goal_bounds: None,
            nodes: Vec::new(),
            index: HashMap::new(),
            open: BinaryHeap::new(),
            open_count: 0,
            seq: 0,
            state: SearchState::NotInitialised,
            result: None,
            expansions: 0,
        }
    }

    /// Discard any previous search and seed the open set with `request.start`.
    pub fn new_search(&mut self, request: PathfindRequest) {
        self.nodes.clear();
        self.index.clear();
        self.open.clear();
        self.open_count = 0;
        self.seq = 0;
        self.result = None;
        self.expansions = 0;
        self.goal_bounds = request.goal.bounds();

        if request.goal.contains(request.start) {
            self.result = Some(PathResult {
                directions: Vec::new(),
                goal: request.start,
                requester: request.requester,
            });
            self.state = SearchState::Succeeded;
        } else {
            let h = request.goal.estimate(request.start, self.goal_bounds);
            self.push_node(request.start, 0, h, None, None);
            self.state = SearchState::Searching;
        }
        self.request = Some(request);
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn request(&self) -> Option<&PathfindRequest> {
        self.request.as_ref()
    }

    /// Total node expansions performed by the current search.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    /// Advance by at most `max_iterations` expansions.
    pub fn step(&mut self, domain: &impl GridDomain, max_iterations: usize) -> SearchState {
        if self.state != SearchState::Searching {
            return self.state;
        }
        let Some(request) = self.request.take() else {
            return self.state;
        };

        for _ in 0..max_iterations {
            let Some(current) = self.pop_open() else {
                self.state = SearchState::Failed;
                break;
            };
            self.expansions += 1;
            let (pos, g) = (self.nodes[current].pos, self.nodes[current].g);

            if request.goal.contains(pos) {
                self.result = Some(PathResult {
                    directions: self.reconstruct(current),
                    goal: pos,
                    requester: request.requester,
                });
                self.state = SearchState::Succeeded;
                break;
            }

            for dir in Direction::ALL {
                let Some(next) = domain.passable_step(pos, dir) else {
                    continue;
                };
                let tentative = g.saturating_add(domain.step_cost(pos, next));
                match self.index.get(&next).copied() {
                    Some(existing) => {
                        let node = &mut self.nodes[existing];
                        if node.closed || node.g <= tentative {
                            continue;
                        }
                        node.g = tentative;
                        node.f = tentative + node.h;
                        node.parent = Some(current);
                        node.dir = Some(dir);
                        let entry = OpenEntry {
                            f: node.f,
                            seq: self.seq,
                            node: existing,
                            g: tentative,
                        };
                        self.seq += 1;
                        self.open.push(Reverse(entry));
                    }
                    None => {
                        let h = request.goal.estimate(next, self.goal_bounds);
                        self.push_node(next, tentative, h, Some(current), Some(dir));
                    }
                }
            }

            if self.open_count == 0 {
                self.state = SearchState::Failed;
                break;
            }
        }

        match self.state {
            SearchState::Succeeded => debug!(
                "path {} -> {:?} found after {} expansions",
                request.start, request.goal, self.expansions
            ),
            SearchState::Failed => debug!(
                "path {} -> {:?} failed after {} expansions",
                request.start, request.goal, self.expansions
            ),
            _ => {}
        }
        self.request = Some(request);
        self.state
    }

    /// Step until a terminal state is reached.
    pub fn run_to_completion(&mut self, domain: &impl GridDomain) -> SearchState {
        while self.state == SearchState::Searching {
            self.step(domain, usize::MAX);
        }
        self.state
    }

    /// The path found. Only valid after the search reported `Succeeded`.
    pub fn final_result(&self) -> Result<&PathResult, SearchError> {
        match self.state {
            SearchState::NotInitialised => Err(SearchError::NotInitialised),
            SearchState::Searching => Err(SearchError::StillSearching),
            SearchState::Failed => Err(SearchError::NotFound),
            SearchState::Succeeded => self.result.as_ref().ok_or(SearchError::NotFound),
        }
    }

    fn push_node(
        &mut self,
        pos: GridPos,
        g: u32,
        h: u32,
        parent: Option<usize>,
        dir: Option<Direction>,
    ) {
        let idx = self.nodes.len();
        self.nodes.push(SearchNode {
            pos,
            g,
            h,
            f: g + h,
            parent,
            dir,
            closed: false,
        });
        self.index.insert(pos, idx);
        self.open.push(Reverse(OpenEntry {
            f: g + h,
            seq: self.seq,
            node: idx,
            g,
        }));
        self.seq += 1;
        self.open_count += 1;
    }

    /// Pop the best live open node, skipping entries made stale by a
    /// later improvement, and close it.
    fn pop_open(&mut self) -> Option<usize> {
        while let Some(Reverse(entry)) = self.open.pop() {
            let node = &mut self.nodes[entry.node];
            if node.closed || node.g != entry.g {
                continue;
            }
            node.closed = true;
            self.open_count -= 1;
            return Some(entry.node);
        }
        None
    }

    fn reconstruct(&self, mut idx: usize) -> Vec<Direction> {
        let mut directions = Vec::new();
        while let (Some(parent), Some(dir)) = (self.nodes[idx].parent, self.nodes[idx].dir) {
            directions.push(dir);
            idx = parent;
        }
        directions.reverse();
        directions
    }
}

/// Incremental flood fill. Visits every position reachable from the
/// start through passable steps.
#[derive(Debug, Clone)]
pub struct FillFinder {
    start: Option<GridPos>,
    open: VecDeque<GridPos>,
    seen: HashSet<GridPos>,
    visited: Vec<GridPos>,
    state: SearchState,
}

impl Default for FillFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl FillFinder {
    pub fn new() -> Self {
        Self {
            start: None,
            open: VecDeque::new(),
            seen: HashSet::new(),
            visited: Vec::new(),
            state: SearchState::NotInitialised,
        }
    }

    pub fn new_fill(&mut self, start: GridPos) {
        self.open.clear();
        self.seen.clear();
        self.visited.clear();
        self.open.push_back(start);
        self.seen.insert(start);
        self.start = Some(start);
        self.state = SearchState::Searching;
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn start(&self) -> Option<GridPos> {
        self.start
    }

    /// Visit at most `max_iterations` positions. Reports `Succeeded` once
    /// the open set is exhausted.
    pub fn step(&mut self, domain: &impl GridDomain, max_iterations: usize) -> SearchState {
        if self.state != SearchState::Searching {
            return self.state;
        }
        for _ in 0..max_iterations {
            let Some(pos) = self.open.pop_front() else {
                break;
            };
            self.visited.push(pos);
            for dir in Direction::ALL {
                if let Some(next) = domain.passable_step(pos, dir) {
                    if self.seen.insert(next) {
                        self.open.push_back(next);
                    }
                }
            }
        }
        if self.open.is_empty() {
            self.state = SearchState::Succeeded;
        }
        self.state
    }

    pub fn run_to_completion(&mut self, domain: &impl GridDomain) -> SearchState {
        while self.state == SearchState::Searching {
            self.step(domain, usize::MAX);
        }
        self.state
    }

    /// Every visited position in visitation order. Valid once the fill
    /// has `Succeeded`.
    pub fn visited(&self) -> Result<&[GridPos], SearchError> {
        match self.state {
            SearchState::NotInitialised => Err(SearchError::NotInitialised),
            SearchState::Searching => Err(SearchError::StillSearching),
            SearchState::Failed => Err(SearchError::NotFound),
            SearchState::Succeeded => Ok(&self.visited),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{apply_directions, TileGrid};

    /// Parse rows of `.` (open) and `#` (wall).
    fn grid(rows: &[&str]) -> TileGrid {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        TileGrid::from_fn(width, height, |p| {
            rows[p.y as usize].as_bytes()[p.x as usize] == b'.'
        })
    }

    #[test]
    fn test_not_initialised() {
        let g = TileGrid::open(2, 2);
        let mut pf = Pathfinder::new();
        assert_eq!(pf.step(&g, 10), SearchState::NotInitialised);
        assert_eq!(pf.final_result(), Err(SearchError::NotInitialised));
    }

    #[test]
    fn test_start_equals_goal() {
        let g = TileGrid::open(3, 3);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(0, 0), 1));
        assert_eq!(pf.state(), SearchState::Succeeded);
        assert!(pf.final_result().unwrap().directions.is_empty());
        assert_eq!(pf.step(&g, 1), SearchState::Succeeded);
    }

    #[test]
    fn test_straight_line() {
        let g = TileGrid::open(5, 1);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(4, 0), 9));
        assert_eq!(pf.run_to_completion(&g), SearchState::Succeeded);
        let result = pf.final_result().unwrap();
        assert_eq!(result.directions, vec![Direction::East; 4]);
        assert_eq!(result.requester, 9);
    }

    #[test]
    fn test_path_around_wall() {
        let g = grid(&[
            ".....", //
            ".###.", //
            "...#.", //
        ]);
        let start = GridPos::new(0, 2);
        let goal = GridPos::new(4, 2);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(start, goal, 0));
        assert_eq!(pf.run_to_completion(&g), SearchState::Succeeded);
        let dirs = &pf.final_result().unwrap().directions;
        assert_eq!(dirs.len(), 8);
        assert_eq!(apply_directions(start, dirs), goal);
    }

    #[test]
    fn test_step_respects_budget() {
        let g = TileGrid::open(20, 20);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(19, 19), 0));
        assert_eq!(pf.step(&g, 3), SearchState::Searching);
        assert_eq!(pf.expansions(), 3);
        assert_eq!(pf.final_result(), Err(SearchError::StillSearching));
        let mut calls = 0;
        while pf.step(&g, 5) == SearchState::Searching {
            calls += 1;
            assert!(calls < 1000);
        }
        assert_eq!(pf.state(), SearchState::Succeeded);
    }

    #[test]
    fn test_enclosed_goal_fails() {
        let g = grid(&[
            ".....", //
            "..#..", //
            ".#.#.", //
            "..#..", //
        ]);
        let reachable = g.tiles().filter(|t| t.accessible).count() - 1;
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(2, 2), 0));
        let mut calls = 0;
        while pf.step(&g, 1) == SearchState::Searching {
            calls += 1;
        }
        calls += 1;
        assert_eq!(pf.state(), SearchState::Failed);
        assert!(calls <= reachable);
        assert_eq!(pf.final_result(), Err(SearchError::NotFound));
    }

    #[test]
    fn test_terminal_state_is_idempotent() {
        let g = TileGrid::open(4, 4);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(3, 2), 0));
        pf.run_to_completion(&g);
        let before = pf.final_result().unwrap().clone();
        let expansions = pf.expansions();
        for _ in 0..3 {
            assert_eq!(pf.step(&g, 100), SearchState::Succeeded);
        }
        assert_eq!(pf.final_result().unwrap(), &before);
        assert_eq!(pf.expansions(), expansions);

        let walled = grid(&[
            "..#.", //
            "..#.", //
        ]);
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(3, 1), 0));
        assert_eq!(pf.run_to_completion(&walled), SearchState::Failed);
        let expansions = pf.expansions();
        for _ in 0..3 {
            assert_eq!(pf.step(&walled, 100), SearchState::Failed);
        }
        assert_eq!(pf.expansions(), expansions);
        assert_eq!(pf.final_result(), Err(SearchError::NotFound));
    }

    #[test]
    fn test_multi_goal_reaches_nearest_member() {
        let g = TileGrid::open(10, 10);
        let goals = [GridPos::new(9, 0), GridPos::new(0, 3), GridPos::new(9, 9)];
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_any(GridPos::new(0, 0), goals, 0));
        assert_eq!(pf.run_to_completion(&g), SearchState::Succeeded);
        let result = pf.final_result().unwrap();
        assert_eq!(result.goal, GridPos::new(0, 3));
        assert_eq!(result.directions.len(), 3);
    }

    #[test]
    fn test_multi_goal_reaches_a_member() {
        let g = TileGrid::open(10, 10);
        let goals = [GridPos::new(9, 9), GridPos::new(2, 0), GridPos::new(0, 9)];
        let start = GridPos::new(0, 0);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_any(start, goals, 3));
        assert_eq!(pf.run_to_completion(&g), SearchState::Succeeded);
        let result = pf.final_result().unwrap();
        assert!(goals.contains(&result.goal));
        assert_eq!(apply_directions(start, &result.directions), result.goal);
    }

    #[test]
    fn test_new_search_resets() {
        let g = TileGrid::open(4, 1);
        let mut pf = Pathfinder::new();
        pf.new_search(PathfindRequest::to_point(GridPos::new(0, 0), GridPos::new(3, 0), 0));
        pf.step(&g, 1);
        pf.new_search(PathfindRequest::to_point(GridPos::new(3, 0), GridPos::new(2, 0), 0));
        assert_eq!(pf.expansions(), 0);
        pf.run_to_completion(&g);
        assert_eq!(pf.final_result().unwrap().directions, vec![Direction::West]);
    }

    #[test]
    fn test_fill_visits_component() {
        let g = grid(&[
            "..#..", //
            "..#..", //
        ]);
        let mut fill = FillFinder::new();
        fill.new_fill(GridPos::new(0, 0));
        assert_eq!(fill.step(&g, 1), SearchState::Searching);
        assert_eq!(fill.visited(), Err(SearchError::StillSearching));
        assert_eq!(fill.run_to_completion(&g), SearchState::Succeeded);
        let mut visited = fill.visited().unwrap().to_vec();
        visited.sort();
        assert_eq!(
            visited,
            vec![
                GridPos::new(0, 0),
                GridPos::new(0, 1),
                GridPos::new(1, 0),
                GridPos::new(1, 1)
            ]
        );
    }
}
