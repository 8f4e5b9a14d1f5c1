use std::fmt;

use crate::error::{InvalidMove, StructuralError};

const MAX_BOXES: usize = u8::MAX as usize;

/// Box identifiers run from 1 to the number of boxes.
pub type BoxId = u8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Point { x, y }
    }

    /// The neighbouring cell in the given direction. May lie outside the board.
    pub fn step(self, dir: Direction) -> Point {
        let (dx, dy) = dir.delta();
        Point {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Sort key for box order ranks: top to bottom, then left to right.
    fn order_key(self) -> (i16, i16) {
        (self.y, self.x)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Directions are numbered clockwise starting at Right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

pub const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::Right,
    Direction::Down,
    Direction::Left,
    Direction::Up,
];

impl Direction {
    pub fn delta(self) -> (i16, i16) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Direction::Right => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Up => 3,
        }
    }

    pub fn from_index(idx: usize) -> Direction {
        ALL_DIRECTIONS[idx % 4]
    }

    pub fn clockwise(self) -> Direction {
        Direction::from_index(self.index() + 1)
    }

    pub fn counter_clockwise(self) -> Direction {
        Direction::from_index(self.index() + 3)
    }

    pub fn opposite(self) -> Direction {
        Direction::from_index(self.index() + 2)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }

    /// Single-letter form used when printing solution paths.
    pub fn letter(self) -> char {
        match self {
            Direction::Right => 'R',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Up => 'U',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Right => write!(f, "Right"),
            Direction::Down => write!(f, "Down"),
            Direction::Left => write!(f, "Left"),
            Direction::Up => write!(f, "Up"),
        }
    }
}

/// A single board cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Field {
    wall: bool,
    goal: bool,
    dead: bool,
    box_id: Option<BoxId>,
}

impl Field {
    pub fn wall() -> Self {
        Field {
            wall: true,
            ..Field::default()
        }
    }

    pub fn goal() -> Self {
        Field {
            goal: true,
            ..Field::default()
        }
    }

    pub fn is_wall(&self) -> bool {
        self.wall
    }

    pub fn is_goal(&self) -> bool {
        self.goal
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn box_id(&self) -> Option<BoxId> {
        self.box_id
    }
}

/// Rectangular grid of fields, stored row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: usize,
    height: usize,
    fields: Vec<Field>,
}

impl Board {
    /// An all-floor board.
    pub fn new(width: usize, height: usize) -> Self {
        Board {
            width,
            height,
            fields: vec![Field::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, p: Point) -> Option<usize> {
        if p.x < 0 || p.y < 0 {
            return None;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.index(p).is_some()
    }

    pub fn get(&self, p: Point) -> Option<&Field> {
        self.index(p).map(|idx| &self.fields[idx])
    }

    fn get_mut(&mut self, p: Point) -> Option<&mut Field> {
        self.index(p).map(move |idx| &mut self.fields[idx])
    }

    /// Replaces the static part of a cell (wall and goal flags).
    pub fn set(&mut self, p: Point, field: Field) {
        if let Some(cell) = self.get_mut(p) {
            cell.wall = field.wall;
            cell.goal = field.goal;
        }
    }

    /// True for walls and for anything beyond the board border.
    pub fn is_blocked(&self, p: Point) -> bool {
        self.get(p).is_none_or(Field::is_wall)
    }

    pub(crate) fn mark_dead(&mut self, p: Point) {
        if let Some(cell) = self.get_mut(p) {
            cell.dead = true;
        }
    }

    fn set_box(&mut self, p: Point, id: Option<BoxId>) {
        if let Some(cell) = self.get_mut(p) {
            cell.box_id = id;
        }
    }

    /// All cell coordinates in reading order.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).map(move |x| Point::new(x as i16, y as i16))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxState {
    pub position: Point,
    /// Rank in the top-to-bottom, left-to-right box ordering (0-based).
    pub order: usize,
}

/// Everything needed to reverse one move exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Point,
    pub to: Point,
    pub direction: Direction,
    pub pushed: Option<BoxId>,
}

/// Puzzle state: board, figure, boxes and the undo history.
///
/// An engine is owned by exactly one search worker at a time; forking a
/// branch clones it. Cloning copies board and boxes but starts a fresh
/// history, so every branch keeps its own undo trail from the fork point.
#[derive(Debug)]
pub struct Engine {
    board: Board,
    figure: Point,
    boxes: Vec<BoxState>,
    by_order: Vec<BoxId>,
    goals: Vec<Point>,
    empty_goals: usize,
    history: Vec<MoveRecord>,
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Engine {
            board: self.board.clone(),
            figure: self.figure,
            boxes: self.boxes.clone(),
            by_order: self.by_order.clone(),
            goals: self.goals.clone(),
            empty_goals: self.empty_goals,
            history: Vec::new(),
        }
    }
}

fn slot(id: BoxId) -> usize {
    id as usize - 1
}

impl Engine {
    /// Build an engine from a board with walls and goals set, the figure
    /// position and the box positions. Boxes get ids 1..N in the given order.
    pub fn new(mut board: Board, figure: Point, boxes: &[Point]) -> Result<Self, String> {
        if boxes.len() > MAX_BOXES {
            return Err(format!(
                "Box count {} exceeds maximum {}",
                boxes.len(),
                MAX_BOXES
            ));
        }

        match board.get(figure) {
            None => return Err(format!("Figure {} is outside the board", figure)),
            Some(field) if field.is_wall() => {
                return Err(format!("Figure {} stands on a wall", figure));
            }
            Some(_) => {}
        }

        let mut states = Vec::with_capacity(boxes.len());
        for (i, &pos) in boxes.iter().enumerate() {
            let id = (i + 1) as BoxId;
            match board.get(pos) {
                None => return Err(format!("Box {} at {} is outside the board", id, pos)),
                Some(field) if field.is_wall() => {
                    return Err(format!("Box {} at {} is inside a wall", id, pos));
                }
                Some(field) if field.box_id().is_some() => {
                    return Err(format!("Two boxes at {}", pos));
                }
                Some(_) => {}
            }
            if pos == figure {
                return Err(format!("Box {} shares {} with the figure", id, pos));
            }
            board.set_box(pos, Some(id));
            states.push(BoxState {
                position: pos,
                order: 0,
            });
        }

        let mut by_order: Vec<BoxId> = (1..=boxes.len()).map(|id| id as BoxId).collect();
        by_order.sort_by_key(|&id| states[slot(id)].position.order_key());
        for (rank, &id) in by_order.iter().enumerate() {
            states[slot(id)].order = rank;
        }

        let goals: Vec<Point> = board
            .points()
            .filter(|&p| board.get(p).is_some_and(Field::is_goal))
            .collect();
        let empty_goals = goals
            .iter()
            .filter(|&&p| board.get(p).is_some_and(|f| f.box_id().is_none()))
            .count();

        Ok(Engine {
            board,
            figure,
            boxes: states,
            by_order,
            goals,
            empty_goals,
            history: Vec::new(),
        })
    }

    /// Parse a Sokoban board from text format.
    ///
    /// Characters:
    /// - `#` = Wall
    /// - ` `, `-`, `_` = Floor (empty space)
    /// - `.` = Goal (target location for boxes)
    /// - `$` = Box
    /// - `@` = Player
    /// - `*` = Box on goal
    /// - `+` = Player on goal
    pub fn from_text(text: &str) -> Result<Self, String> {
        let lines: Vec<&str> = text.lines().collect();

        if lines.is_empty() {
            return Err("Empty board".to_string());
        }

        let height = lines.len();
        let width = lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        if width > i16::MAX as usize || height > i16::MAX as usize {
            return Err(format!("Board {}x{} is too large", width, height));
        }

        let mut board = Board::new(width, height);
        let mut figure = None;
        let mut boxes = Vec::new();
        let mut goal_count = 0usize;

        for (y, line) in lines.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                let p = Point::new(x as i16, y as i16);
                match ch {
                    '#' => board.set(p, Field::wall()),
                    ' ' | '-' | '_' => {}
                    '.' => {
                        board.set(p, Field::goal());
                        goal_count += 1;
                    }
                    '$' => boxes.push(p),
                    '*' => {
                        board.set(p, Field::goal());
                        boxes.push(p);
                        goal_count += 1;
                    }
                    '@' | '+' => {
                        if figure.is_some() {
                            return Err("Multiple players found".to_string());
                        }
                        if ch == '+' {
                            board.set(p, Field::goal());
                            goal_count += 1;
                        }
                        figure = Some(p);
                    }
                    _ => {
                        return Err(format!(
                            "Invalid character '{}' at position ({}, {})",
                            ch, x, y
                        ));
                    }
                }
            }
        }

        let figure = figure.ok_or("No player found on board")?;

        // Validate that the number of goals matches the number of boxes
        if goal_count != boxes.len() {
            return Err(format!(
                "Goal count ({}) does not match box count ({})",
                goal_count,
                boxes.len()
            ));
        }

        Engine::new(board, figure, &boxes)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    #[cfg(test)]
    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn figure(&self) -> Point {
        self.figure
    }

    pub fn box_count(&self) -> usize {
        self.boxes.len()
    }

    /// Position of box `id`, or `None` if no box has that id.
    pub fn box_position(&self, id: BoxId) -> Option<Point> {
        self.box_state(id).map(|b| b.position)
    }

    pub fn order_of(&self, id: BoxId) -> Option<usize> {
        self.box_state(id).map(|b| b.order)
    }

    fn box_state(&self, id: BoxId) -> Option<&BoxState> {
        self.boxes.get(usize::from(id).checked_sub(1)?)
    }

    /// Box ids ordered by rank.
    pub fn boxes_by_order(&self) -> &[BoxId] {
        &self.by_order
    }

    pub fn goals(&self) -> &[Point] {
        &self.goals
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Run the dead-field preprocessor on this engine's board. Returns the
    /// number of newly marked fields.
    pub fn mark_dead_fields(&mut self) -> usize {
        crate::deadlocks::mark_dead_fields(&mut self.board)
    }

    pub fn dead_field_count(&self) -> usize {
        self.board
            .points()
            .filter(|&p| self.board.get(p).is_some_and(Field::is_dead))
            .count()
    }

    /// Try to move the figure one cell, pushing a box if one is in the way.
    /// Returns the id of the pushed box, if any.
    pub fn move_figure(&mut self, dir: Direction) -> Result<Option<BoxId>, InvalidMove> {
        let target = self.figure.step(dir);
        let field = self.board.get(target).ok_or(InvalidMove::OffBoard)?;
        if field.is_wall() {
            return Err(InvalidMove::Wall);
        }

        let pushed = field.box_id();
        if let Some(id) = pushed {
            let dest = target.step(dir);
            let dest_field = self.board.get(dest).ok_or(InvalidMove::Blocked)?;
            if dest_field.is_wall() || dest_field.box_id().is_some() {
                return Err(InvalidMove::Blocked);
            }
            if dest_field.is_dead() {
                return Err(InvalidMove::DeadField);
            }
            self.relocate_box(id, target, dest);
            if dir.is_vertical() {
                self.repair_order(id, dir);
            }
        }

        self.history.push(MoveRecord {
            from: self.figure,
            to: target,
            direction: dir,
            pushed,
        });
        self.figure = target;
        Ok(pushed)
    }

    /// Reverse the most recent move.
    pub fn undo_step(&mut self) -> Result<MoveRecord, StructuralError> {
        let record = self.history.pop().ok_or(StructuralError::EmptyHistory)?;
        if let Some(id) = record.pushed {
            let box_now = record.to.step(record.direction);
            self.relocate_box(id, box_now, record.to);
            if record.direction.is_vertical() {
                self.repair_order(id, record.direction.opposite());
            }
        }
        self.figure = record.from;
        Ok(record)
    }

    /// Check if all goals hold a box (win condition)
    pub fn won(&self) -> bool {
        self.empty_goals == 0
    }

    /// Figure position followed by every box position in rank order.
    pub fn configuration(&self) -> Vec<Point> {
        let mut config = Vec::with_capacity(self.boxes.len() + 1);
        config.push(self.figure);
        config.extend(self.by_order.iter().map(|&id| self.boxes[slot(id)].position));
        config
    }

    fn relocate_box(&mut self, id: BoxId, from: Point, to: Point) {
        if self.board.get(from).is_some_and(Field::is_goal) {
            self.empty_goals += 1;
        }
        if self.board.get(to).is_some_and(Field::is_goal) {
            self.empty_goals -= 1;
        }
        self.board.set_box(from, None);
        self.board.set_box(to, Some(id));
        self.boxes[slot(id)].position = to;
    }

    /// Restore rank order after box `id` moved vertically by bubbling it past
    /// its neighbours in the direction it travelled.
    fn repair_order(&mut self, id: BoxId, dir: Direction) {
        let key = self.boxes[slot(id)].position.order_key();
        loop {
            let rank = self.boxes[slot(id)].order;
            let neighbour = match dir {
                Direction::Down if rank + 1 < self.by_order.len() => rank + 1,
                Direction::Up if rank > 0 => rank - 1,
                _ => return,
            };
            let other = self.by_order[neighbour];
            let other_key = self.boxes[slot(other)].position.order_key();
            let out_of_order = match dir {
                Direction::Down => other_key < key,
                _ => other_key > key,
            };
            if !out_of_order {
                return;
            }
            self.by_order.swap(rank, neighbour);
            self.boxes[slot(id)].order = neighbour;
            self.boxes[slot(other)].order = rank;
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.board.height() {
            let mut line = String::new();
            for x in 0..self.board.width() {
                let p = Point::new(x as i16, y as i16);
                let field = self.board.get(p).copied().unwrap_or_default();

                let ch = if p == self.figure {
                    if field.is_goal() { '+' } else { '@' }
                } else if field.box_id().is_some() {
                    if field.is_goal() { '*' } else { '$' }
                } else if field.is_wall() {
                    '#'
                } else if field.is_goal() {
                    '.'
                } else if field.is_dead() {
                    'x'
                } else {
                    ' '
                };
                line.push(ch);
            }
            // Trim trailing spaces to match the XSB input
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    type Snapshot = (Board, Point, Vec<BoxState>, Vec<BoxId>, usize);

    fn snapshot(engine: &Engine) -> Snapshot {
        (
            engine.board.clone(),
            engine.figure,
            engine.boxes.clone(),
            engine.by_order.clone(),
            engine.empty_goals,
        )
    }

    fn assert_consistent(engine: &Engine) {
        for p in engine.board.points() {
            if let Some(id) = engine.board.get(p).and_then(Field::box_id) {
                assert_eq!(engine.box_position(id), Some(p));
            }
        }
        for id in 1..=engine.box_count() as BoxId {
            let pos = engine.box_position(id).unwrap();
            assert_eq!(engine.board.get(pos).and_then(Field::box_id), Some(id));
        }

        // Brute-force reference: a full re-sort of the boxes by position.
        let mut expected: Vec<BoxId> = (1..=engine.box_count() as BoxId).collect();
        expected.sort_by_key(|&id| engine.box_position(id).unwrap().order_key());
        assert_eq!(engine.boxes_by_order(), expected.as_slice());
        for (rank, &id) in expected.iter().enumerate() {
            assert_eq!(engine.order_of(id), Some(rank));
        }

        let empty = engine
            .goals()
            .iter()
            .filter(|&&g| engine.board.get(g).and_then(Field::box_id).is_none())
            .count();
        assert_eq!(engine.won(), empty == 0);
    }

    const OPEN_ROOM: &str = "########\n\
                             #      #\n\
                             # $ $  #\n\
                             #  @ $ #\n\
                             # $  . #\n\
                             #. .   #\n\
                             #   .  #\n\
                             ########";

    #[test]
    fn test_parse_basic_board() {
        let input = "####\n\
                     # .#\n\
                     #  ###\n\
                     #*@  #\n\
                     #  $ #\n\
                     #  ###\n\
                     ####";
        let engine = Engine::from_text(input).unwrap();

        assert_eq!(engine.board().width(), 6);
        assert_eq!(engine.board().height(), 7);
        assert_eq!(engine.figure(), Point::new(2, 3));
        assert_eq!(engine.box_count(), 2);
        assert_eq!(engine.goals().len(), 2);
    }

    #[test]
    fn test_no_player() {
        let input = "####\n\
                     #  #\n\
                     ####";
        assert!(Engine::from_text(input).is_err());
    }

    #[test]
    fn test_multiple_players() {
        let input = "####\n\
                     #@@#\n\
                     ####";
        assert!(Engine::from_text(input).is_err());
    }

    #[test]
    fn test_invalid_character() {
        assert!(Engine::from_text("####\n#@?#\n####").is_err());
    }

    #[test]
    fn test_player_on_goal() {
        let input = "####\n\
                     #$+ #\n\
                     #$. #\n\
                     ####";
        let engine = Engine::from_text(input).unwrap();
        assert_eq!(engine.figure(), Point::new(2, 1));
        assert!(engine.board().get(Point::new(2, 1)).unwrap().is_goal());
    }

    #[test]
    fn test_display() {
        let input = "####\n\
                     # .#\n\
                     #  ###\n\
                     #*@  #\n\
                     #  $ #\n\
                     #  ###\n\
                     ####";
        let engine = Engine::from_text(input).unwrap();
        let output = engine.to_string();
        assert_eq!(output.trim(), input);
    }

    #[test]
    fn test_goal_box_count_validation() {
        let more_goals = "####\n\
                          #..#\n\
                          # $@#\n\
                          ####";
        assert!(Engine::from_text(more_goals).is_err());

        let more_boxes = "####\n\
                          #$$#\n\
                          # .@#\n\
                          ####";
        assert!(Engine::from_text(more_boxes).is_err());

        let balanced = "####\n\
                        #$.#\n\
                        # * #\n\
                        # @#\n\
                        ####";
        assert!(Engine::from_text(balanced).is_ok());
    }

    #[test]
    fn test_initial_order_follows_reading_order() {
        let engine = Engine::from_text(OPEN_ROOM).unwrap();
        assert_eq!(engine.boxes_by_order(), &[1, 2, 3, 4]);
        assert_consistent(&engine);
    }

    #[test]
    fn test_won() {
        let solved = "####\n\
                      #*@#\n\
                      ####";
        assert!(Engine::from_text(solved).unwrap().won());

        let unsolved = "####\n\
                        #$.#\n\
                        # @#\n\
                        ####";
        assert!(!Engine::from_text(unsolved).unwrap().won());
    }

    #[test]
    fn test_move_push_onto_goal() {
        let input = "#####\n\
                     #@$.#\n\
                     #####";
        let mut engine = Engine::from_text(input).unwrap();
        let before = snapshot(&engine);

        assert_eq!(engine.move_figure(Direction::Right), Ok(Some(1)));
        assert_eq!(engine.figure(), Point::new(2, 1));
        assert_eq!(engine.box_position(1), Some(Point::new(3, 1)));
        assert!(engine.won());
        assert_eq!(engine.history_len(), 1);

        engine.undo_step().unwrap();
        assert_eq!(snapshot(&engine), before);
        assert!(!engine.won());
        assert_eq!(engine.history_len(), 0);
    }

    #[test]
    fn test_move_rejections() {
        let input = "######\n\
                     #@$$.#\n\
                     #   .#\n\
                     ######";
        let mut engine = Engine::from_text(input).unwrap();
        assert_eq!(engine.move_figure(Direction::Up), Err(InvalidMove::Wall));
        assert_eq!(engine.move_figure(Direction::Right), Err(InvalidMove::Blocked));
        assert_eq!(engine.history_len(), 0);

        let mut engine = Engine::new(
            {
                let mut board = Board::new(2, 1);
                board.set(Point::new(1, 0), Field::goal());
                board
            },
            Point::new(0, 0),
            &[Point::new(1, 0)],
        )
        .unwrap();
        assert_eq!(engine.to_string().trim(), "@*");
        assert_eq!(engine.move_figure(Direction::Left), Err(InvalidMove::OffBoard));
        assert_eq!(engine.move_figure(Direction::Right), Err(InvalidMove::Blocked));
    }

    #[test]
    fn test_push_onto_dead_field_rejected() {
        let input = "#####\n\
                     #   #\n\
                     #$  #\n\
                     #@ .#\n\
                     #####";
        let mut engine = Engine::from_text(input).unwrap();
        engine.board_mut().mark_dead(Point::new(1, 1));
        assert_eq!(engine.move_figure(Direction::Up), Err(InvalidMove::DeadField));
        assert_eq!(engine.figure(), Point::new(1, 3));
        assert_eq!(engine.box_position(1), Some(Point::new(1, 2)));
        // The figure itself may walk onto a dead field.
        assert_eq!(engine.move_figure(Direction::Right), Ok(None));
        assert_eq!(engine.move_figure(Direction::Up), Ok(None));
        assert_eq!(engine.move_figure(Direction::Up), Ok(None));
        assert_eq!(engine.move_figure(Direction::Left), Ok(None));
    }

    #[test]
    fn test_undo_empty_history() {
        let mut engine = Engine::from_text(OPEN_ROOM).unwrap();
        assert_eq!(engine.undo_step(), Err(StructuralError::EmptyHistory));
    }

    #[test]
    fn test_unknown_box_id() {
        let engine = Engine::from_text(OPEN_ROOM).unwrap();
        assert_eq!(engine.box_position(0), None);
        assert_eq!(engine.order_of(0), None);
        assert_eq!(engine.box_position(5), None);
        assert_eq!(engine.order_of(5), None);
        assert_eq!(engine.box_position(4), Some(Point::new(2, 4)));
        assert_eq!(engine.order_of(4), Some(3));
    }

    #[test]
    fn test_clone_resets_history() {
        let mut engine = Engine::from_text(OPEN_ROOM).unwrap();
        engine.move_figure(Direction::Down).unwrap();
        engine.move_figure(Direction::Left).unwrap();
        let mut fork = engine.clone();
        assert_eq!(fork.history_len(), 0);
        assert_eq!(fork.configuration(), engine.configuration());

        fork.move_figure(Direction::Down).unwrap();
        assert_ne!(fork.configuration(), engine.configuration());
        assert_eq!(engine.history_len(), 2);
    }

    #[test]
    fn test_vertical_push_reorders() {
        // Box 1 starts above box 2 and is pushed down past it.
        let input = "######\n\
                     #  @ #\n\
                     #  $ #\n\
                     # $  #\n\
                     #    #\n\
                     # .. #\n\
                     ######";
        let mut engine = Engine::from_text(input).unwrap();
        assert_eq!(engine.boxes_by_order(), &[1, 2]);
        engine.move_figure(Direction::Down).unwrap();
        assert_eq!(engine.box_position(1), Some(Point::new(3, 3)));
        assert_eq!(engine.boxes_by_order(), &[2, 1]);
        engine.move_figure(Direction::Down).unwrap();
        assert_eq!(engine.boxes_by_order(), &[2, 1]);
        assert_consistent(&engine);

        engine.undo_step().unwrap();
        engine.undo_step().unwrap();
        assert_eq!(engine.boxes_by_order(), &[1, 2]);
        assert_eq!(engine.order_of(1), Some(0));
        assert_eq!(engine.order_of(2), Some(1));
    }

    #[test]
    fn test_random_walk_order_matches_full_resort() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        let mut engine = Engine::from_text(OPEN_ROOM).unwrap();
        let mut moves = 0;
        for _ in 0..5000 {
            let dir = Direction::from_index(rng.gen_range(0..4));
            if engine.move_figure(dir).is_ok() {
                moves += 1;
            }
            assert_consistent(&engine);
        }
        assert_eq!(engine.history_len(), moves);
        while engine.history_len() > 0 {
            engine.undo_step().unwrap();
            assert_consistent(&engine);
        }
        assert_eq!(
            engine.configuration(),
            Engine::from_text(OPEN_ROOM).unwrap().configuration()
        );
    }

    #[test]
    fn test_move_undo_inverse() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut engine = Engine::from_text(OPEN_ROOM).unwrap();
        for _ in 0..2000 {
            let dir = Direction::from_index(rng.gen_range(0..4));
            let before = snapshot(&engine);
            if engine.move_figure(dir).is_err() {
                assert_eq!(snapshot(&engine), before);
                continue;
            }
            let record = engine.undo_step().unwrap();
            assert_eq!(record.direction, dir);
            assert_eq!(snapshot(&engine), before);
            engine.move_figure(dir).unwrap();
        }
    }
}
