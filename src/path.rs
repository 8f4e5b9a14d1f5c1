use arrayvec::ArrayVec;

use crate::engine::Direction;
use crate::error::StructuralError;

/// Rotation state of one search depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Number of rotations done so far; -1 before the first one.
    counter: i8,
    dir: Option<Direction>,
    /// Directions parked because they would push a box off a goal.
    ignored: ArrayVec<Direction, 4>,
}

impl Default for Node {
    fn default() -> Self {
        Node::new()
    }
}

impl Node {
    /// A node whose first rotation tries Right.
    pub fn new() -> Self {
        Node {
            counter: -1,
            dir: None,
            ignored: ArrayVec::new(),
        }
    }

    /// A node whose first rotation tries `dir`.
    pub fn starting_at(dir: Direction) -> Self {
        Node {
            dir: Some(dir.counter_clockwise()),
            ..Node::new()
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        self.dir
    }

    pub fn set_direction(&mut self, dir: Direction) {
        self.dir = Some(dir);
    }

    pub fn counter(&self) -> i8 {
        self.counter
    }

    /// Advance to the next direction clockwise and return it.
    pub fn rotate(&mut self) -> Direction {
        let dir = match self.dir {
            None => Direction::Right,
            Some(dir) => dir.clockwise(),
        };
        self.dir = Some(dir);
        self.counter = self.counter.saturating_add(1);
        dir
    }

    /// All four directions have been tried.
    pub fn exhausted(&self) -> bool {
        self.counter > 3
    }

    pub fn push_ignored(&mut self, dir: Direction) {
        // A direction is parked at most once per rotation round.
        if !self.ignored.contains(&dir) {
            self.ignored.push(dir);
        }
    }

    pub fn pop_ignored(&mut self) -> Option<Direction> {
        self.ignored.pop()
    }

    pub fn ignored(&self) -> &[Direction] {
        &self.ignored
    }
}

/// Stack of rotation nodes, one per search depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    nodes: Vec<Node>,
}

impl Path {
    pub fn new() -> Self {
        Path { nodes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.nodes.len()
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Result<Node, StructuralError> {
        self.nodes.pop().ok_or(StructuralError::EmptyPath)
    }

    pub fn current(&self) -> Result<&Node, StructuralError> {
        self.nodes.last().ok_or(StructuralError::EmptyPath)
    }

    pub fn current_mut(&mut self) -> Result<&mut Node, StructuralError> {
        self.nodes.last_mut().ok_or(StructuralError::EmptyPath)
    }

    /// A new path holding only a copy of the current node. This is what a
    /// forked branch starts from; the deeper history stays with the parent.
    pub fn fork(&self) -> Result<Path, StructuralError> {
        Ok(Path {
            nodes: vec![self.current()?.clone()],
        })
    }

    /// Directions taken to reach the current depth. The current node is still
    /// rotating and is not part of the walked path.
    pub fn directions(&self) -> Vec<Direction> {
        let walked = self.nodes.len().saturating_sub(1);
        self.nodes[..walked]
            .iter()
            .filter_map(Node::direction)
            .collect()
    }
}
