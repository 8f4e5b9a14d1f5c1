use crate::engine::{ALL_DIRECTIONS, Board, Direction, Field, Point};

/// Returns the second of two consecutive (clockwise) blocked directions around
/// `p` if it forms a corner a box can never leave. Goals are never dead.
pub fn dead_corner(board: &Board, p: Point) -> Option<Direction> {
    if board.get(p).is_none_or(|f| f.is_wall() || f.is_goal()) {
        return None;
    }

    // Scan clockwise, wrapping around once so Up followed by Right is seen.
    let mut previous_blocked = false;
    for i in 0..=ALL_DIRECTIONS.len() {
        let dir = Direction::from_index(i);
        let blocked = board.is_blocked(p.step(dir));
        if blocked && previous_blocked {
            return Some(dir);
        }
        previous_blocked = blocked;
    }
    None
}

/// Mark every statically dead field of the board.
///
/// A field is dead if it is a corner (two adjacent blocked sides) that is not
/// a goal, or if it lies on a straight, goal-free stretch of floor that runs
/// along a continuous wall from one such corner to another.
pub fn mark_dead_fields(board: &mut Board) -> usize {
    let corners: Vec<(Point, Direction)> = board
        .points()
        .filter_map(|p| dead_corner(board, p).map(|dir| (p, dir)))
        .collect();

    let mut marked = 0;
    for (corner, second) in corners {
        let first = second.counter_clockwise();
        let mut dead = vec![corner];

        // Walking away from one wall of the corner, the other wall must flank
        // every step.
        for (walk, flank) in [(second.opposite(), first), (first.opposite(), second)] {
            if let Some(end) = dead_wall_end(board, corner, walk, flank) {
                dead.extend(segment(corner, end, walk));
            }
        }

        for p in dead {
            if !board.get(p).is_some_and(Field::is_dead) {
                board.mark_dead(p);
                marked += 1;
            }
        }
    }

    tracing::debug!(marked, "dead fields marked");
    marked
}

/// Follow the wall from `corner` in direction `walk`. Returns the far corner if
/// the whole stretch is flanked by wall on the `flank` side and holds no goal.
fn dead_wall_end(board: &Board, corner: Point, walk: Direction, flank: Direction) -> Option<Point> {
    let mut p = corner;
    loop {
        p = p.step(walk);
        let field = board.get(p)?;
        if field.is_wall() || field.is_goal() || !board.is_blocked(p.step(flank)) {
            return None;
        }
        if dead_corner(board, p).is_some() {
            return Some(p);
        }
    }
}

fn segment(start: Point, end: Point, walk: Direction) -> Vec<Point> {
    let mut points = Vec::new();
    let mut p = start;
    while p != end {
        p = p.step(walk);
        points.push(p);
    }
    points
}
