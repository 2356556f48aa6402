//! Pyramidal board geometry and vertex state
//!
//! The board is a square grid of side `2 * turns` where `turns = bots²`.
//! Every vertex above the bottom row points at the three vertices below it
//! (left, straight, right) with horizontal wraparound, so every edge strictly
//! increases `y` and the graph is acyclic. Bottom-row vertices are sinks.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Index of a bot in the tournament lineup
pub type BotId = usize;

/// Board coordinate (`x` = column, `y` = row, row 0 on top)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Status of a vertex within one round
///
/// `Inactive` is the only non-terminal status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexStatus {
    #[default]
    Inactive,
    Active,
    Broken,
}

/// Rejected board mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("position {0} is off the board")]
    OutOfRange(Pos),

    #[error("vertex {pos} is {status:?}, not inactive")]
    NotInactive { pos: Pos, status: VertexStatus },

    #[error("vertex {0} cannot become active without an owner")]
    NoOwners(Pos),
}

/// A single board cell
#[derive(Clone, Debug)]
pub struct Vertex {
    children: Vec<Pos>,
    status: VertexStatus,
    owners: FxHashSet<BotId>,
}

impl Vertex {
    fn new(children: Vec<Pos>) -> Self {
        Self {
            children,
            status: VertexStatus::Inactive,
            owners: FxHashSet::default(),
        }
    }

    /// Successors one row below, in (left, straight, right) order
    pub fn children(&self) -> &[Pos] {
        &self.children
    }

    pub fn is_sink(&self) -> bool {
        self.children.is_empty()
    }

    pub fn status(&self) -> VertexStatus {
        self.status
    }

    pub fn owners(&self) -> &FxHashSet<BotId> {
        &self.owners
    }

    /// Owners in ascending id order
    pub fn sorted_owners(&self) -> Vec<BotId> {
        let mut owners: Vec<BotId> = self.owners.iter().copied().collect();
        owners.sort_unstable();
        owners
    }
}

/// The board for one round
#[derive(Clone, Debug)]
pub struct Board {
    side: usize,
    /// Row-major: index = y * side + x
    vertices: Vec<Vertex>,
}

impl Board {
    /// `(turns, side)` for a tournament of `bot_count` bots
    pub fn dimensions(bot_count: usize) -> (usize, usize) {
        let turns = bot_count * bot_count;
        (turns, 2 * turns)
    }

    /// Build a fresh board sized for `bot_count` bots
    pub fn for_bots(bot_count: usize) -> Self {
        let (_, side) = Self::dimensions(bot_count);
        Self::new(side)
    }

    /// Build a fresh board with the given side length
    pub fn new(side: usize) -> Self {
        let mut vertices = Vec::with_capacity(side * side);
        for y in 0..side {
            for x in 0..side {
                let children = if y + 1 == side {
                    Vec::new()
                } else {
                    vec![
                        Pos::new((x + side - 1) % side, y + 1),
                        Pos::new(x, y + 1),
                        Pos::new((x + 1) % side, y + 1),
                    ]
                };
                vertices.push(Vertex::new(children));
            }
        }
        Self { side, vertices }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x < self.side && pos.y < self.side
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        self.contains(pos).then(|| pos.y * self.side + pos.x)
    }

    pub fn get(&self, pos: Pos) -> Option<&Vertex> {
        self.index(pos).map(|i| &self.vertices[i])
    }

    fn get_mut(&mut self, pos: Pos) -> Result<&mut Vertex, BoardError> {
        let i = self.index(pos).ok_or(BoardError::OutOfRange(pos))?;
        Ok(&mut self.vertices[i])
    }

    pub fn status(&self, pos: Pos) -> Option<VertexStatus> {
        self.get(pos).map(Vertex::status)
    }

    /// Children of `pos` (empty for sinks and off-board positions)
    pub fn children(&self, pos: Pos) -> &[Pos] {
        self.get(pos).map(Vertex::children).unwrap_or(&[])
    }

    pub fn is_sink(&self, pos: Pos) -> bool {
        self.get(pos).is_some_and(Vertex::is_sink)
    }

    /// All positions of row 0, left to right
    pub fn top_row(&self) -> impl Iterator<Item = Pos> {
        (0..self.side).map(|x| Pos::new(x, 0))
    }

    /// Every position, row by row
    pub fn positions(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.side).flat_map(move |y| (0..self.side).map(move |x| Pos::new(x, y)))
    }

    /// Number of vertices with the given status
    pub fn count(&self, status: VertexStatus) -> usize {
        self.vertices.iter().filter(|v| v.status == status).count()
    }

    /// Inactive -> Broken
    pub fn break_vertex(&mut self, pos: Pos) -> Result<(), BoardError> {
        let vertex = self.get_mut(pos)?;
        if vertex.status != VertexStatus::Inactive {
            return Err(BoardError::NotInactive { pos, status: vertex.status });
        }
        vertex.status = VertexStatus::Broken;
        Ok(())
    }

    /// Record `bot` as an owner of a still-inactive vertex
    ///
    /// The status is left untouched; [`Board::activate`] commits it.
    pub fn add_owner(&mut self, pos: Pos, bot: BotId) -> Result<(), BoardError> {
        let vertex = self.get_mut(pos)?;
        if vertex.status != VertexStatus::Inactive {
            return Err(BoardError::NotInactive { pos, status: vertex.status });
        }
        vertex.owners.insert(bot);
        Ok(())
    }

    /// Inactive -> Active; the vertex must already have an owner
    pub fn activate(&mut self, pos: Pos) -> Result<(), BoardError> {
        let vertex = self.get_mut(pos)?;
        if vertex.status != VertexStatus::Inactive {
            return Err(BoardError::NotInactive { pos, status: vertex.status });
        }
        if vertex.owners.is_empty() {
            return Err(BoardError::NoOwners(pos));
        }
        vertex.status = VertexStatus::Active;
        Ok(())
    }

    /// Apply a batch of activation claims in one step
    ///
    /// Every claimed vertex must be inactive; if any is not, nothing changes.
    /// Otherwise each claimant joins its vertex's owners and every claimed
    /// vertex becomes active. Returns the number of vertices activated.
    pub fn commit_claims(&mut self, claims: &[(BotId, Pos)]) -> Result<usize, BoardError> {
        for &(_, pos) in claims {
            match self.status(pos) {
                Some(VertexStatus::Inactive) => {}
                Some(status) => return Err(BoardError::NotInactive { pos, status }),
                None => return Err(BoardError::OutOfRange(pos)),
            }
        }

        for &(bot, pos) in claims {
            self.add_owner(pos, bot)?;
        }

        let mut activated = 0;
        for &(_, pos) in claims {
            if self.status(pos) == Some(VertexStatus::Inactive) {
                self.activate(pos)?;
                activated += 1;
            }
        }
        Ok(activated)
    }

    /// Frozen copy of every vertex status
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            side: self.side,
            statuses: self.vertices.iter().map(Vertex::status).collect(),
        }
    }

    /// ASCII dump, bottom row first
    ///
    /// `.` is inactive, a space is broken, and an active vertex shows the
    /// initial of one of its owners picked at random.
    pub fn render<F, R>(&self, initial_of: F, rng: &mut R) -> String
    where
        F: Fn(BotId) -> char,
        R: Rng + ?Sized,
    {
        let mut rows = Vec::with_capacity(self.side);
        for y in (0..self.side).rev() {
            let row: String = (0..self.side)
                .map(|x| {
                    let vertex = &self.vertices[y * self.side + x];
                    match vertex.status {
                        VertexStatus::Inactive => '.',
                        VertexStatus::Broken => ' ',
                        VertexStatus::Active => vertex
                            .sorted_owners()
                            .choose(rng)
                            .map(|&bot| initial_of(bot))
                            .unwrap_or('?'),
                    }
                })
                .collect();
            rows.push(row);
        }
        rows.join("\n")
    }
}

/// Immutable view of vertex statuses taken at one instant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    side: usize,
    statuses: Vec<VertexStatus>,
}

impl StatusSnapshot {
    pub fn status(&self, pos: Pos) -> Option<VertexStatus> {
        (pos.x < self.side && pos.y < self.side).then(|| self.statuses[pos.y * self.side + pos.x])
    }

    /// On the board and inactive at snapshot time
    pub fn is_claimable(&self, pos: Pos) -> bool {
        self.status(pos) == Some(VertexStatus::Inactive)
    }
}
