//! Game replay events and the processing lifecycle.
//!
//! A game reaches the engine as a flat stream of [`GameEvent`]s in
//! game-tree order: each node's setup stones and move, then an
//! end-of-node marker, with branch points before a node's first
//! variations and end-of-variation markers when a variation is exhausted.
//! Every index implements [`GameProcessor`] and sees the same stream.
//!
//! [`GameTree`] builds such streams from a tree of moves, computing
//! captures with [`Board`].

use crate::board::{Board, Color, MoveError, Point};

/// One replay event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// Setup stone (added on top of whatever was there).
    Setup { x: usize, y: usize, color: Color },
    /// Setup removal; `removed` is the stone that was on the point, if any.
    Clear {
        x: usize,
        y: usize,
        removed: Option<Color>,
    },
    /// A move with the stones it captured.
    Move {
        x: usize,
        y: usize,
        color: Color,
        captures: Vec<Point>,
    },
    Pass,
    EndOfNode,
    BranchPoint,
    EndOfVariation,
}

/// A game as delivered by the corpus layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    pub id: i32,
    pub boardsize: usize,
    pub winner: Option<Color>,
    /// Month-resolution date as `year * 12 + (month - 1)`; 0 if unknown.
    pub date: i32,
    pub events: Vec<GameEvent>,
}

impl GameRecord {
    pub fn new(id: i32, boardsize: usize, events: Vec<GameEvent>) -> Self {
        Self {
            id,
            boardsize,
            winner: None,
            date: 0,
            events,
        }
    }

    pub fn with_winner(mut self, winner: Option<Color>) -> Self {
        self.winner = winner;
        self
    }

    pub fn with_date(mut self, year: i32, month: i32) -> Self {
        self.date = year * 12 + (month - 1).clamp(0, 11);
        self
    }
}

/// Lifecycle shared by all per-game indexes.
///
/// `begin_game` and `end_game` bracket the events of one game; `end_game`
/// receives `commit = false` when the game is rejected and its data must be
/// discarded.
pub trait GameProcessor {
    fn begin_game(&mut self, game_id: i32);
    fn setup_stone(&mut self, _x: usize, _y: usize, _color: Color) {}
    fn clear_point(&mut self, _x: usize, _y: usize, _removed: Option<Color>) {}
    fn play(&mut self, _x: usize, _y: usize, _color: Color, _captures: &[Point]) {}
    fn pass(&mut self) {}
    fn end_of_node(&mut self) {}
    fn branch_point(&mut self) {}
    fn end_of_variation(&mut self) {}
    fn end_game(&mut self, commit: bool);
}

/// Feeds the events of one game to a processor, without the begin/end calls.
pub fn dispatch(processor: &mut dyn GameProcessor, events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::Setup { x, y, color } => processor.setup_stone(*x, *y, *color),
            GameEvent::Clear { x, y, removed } => processor.clear_point(*x, *y, *removed),
            GameEvent::Move {
                x,
                y,
                color,
                captures,
            } => processor.play(*x, *y, *color, captures),
            GameEvent::Pass => processor.pass(),
            GameEvent::EndOfNode => processor.end_of_node(),
            GameEvent::BranchPoint => processor.branch_point(),
            GameEvent::EndOfVariation => processor.end_of_variation(),
        }
    }
}

/// The main line of an event stream: everything up to the first end of
/// variation, without branch points.
pub fn main_line(events: &[GameEvent]) -> Vec<GameEvent> {
    events
        .iter()
        .take_while(|e| **e != GameEvent::EndOfVariation)
        .filter(|e| **e != GameEvent::BranchPoint)
        .cloned()
        .collect()
}

/// What a node plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeMove {
    Play(usize, usize, Color),
    Pass,
}

/// A node of a game tree. The first child is the main line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameNode {
    pub setup: Vec<(usize, usize, Color)>,
    pub clear: Vec<Point>,
    pub mv: Option<NodeMove>,
    pub children: Vec<GameNode>,
}

impl GameNode {
    pub fn play(x: usize, y: usize, color: Color) -> Self {
        GameNode {
            mv: Some(NodeMove::Play(x, y, color)),
            ..Default::default()
        }
    }

    pub fn pass() -> Self {
        GameNode {
            mv: Some(NodeMove::Pass),
            ..Default::default()
        }
    }

    pub fn setup(stones: &[(usize, usize, Color)]) -> Self {
        GameNode {
            setup: stones.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: GameNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A game tree rooted at a (usually empty) root node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameTree {
    pub boardsize: usize,
    pub root: GameNode,
}

impl GameTree {
    pub fn new(boardsize: usize) -> Self {
        Self {
            boardsize,
            root: GameNode::default(),
        }
    }

    /// Linear game: one node per move, alternating colors starting with Black.
    pub fn from_moves(boardsize: usize, moves: &[Point]) -> Self {
        let mut tree = Self::new(boardsize);
        let mut color = Color::Black;
        let mut nodes: Vec<GameNode> = Vec::with_capacity(moves.len());
        for &(x, y) in moves {
            nodes.push(GameNode::play(x, y, color));
            color = color.opponent();
        }
        tree.root.children = chain(nodes).into_iter().collect();
        tree
    }

    /// Appends a line of nodes under the node reached by following
    /// `path` (child indices) from the root.
    pub fn add_line(&mut self, path: &[usize], nodes: Vec<GameNode>) -> bool {
        let mut node = &mut self.root;
        for &i in path {
            match node.children.get_mut(i) {
                Some(child) => node = child,
                None => return false,
            }
        }
        if let Some(line) = chain(nodes) {
            node.children.push(line);
        }
        true
    }

    /// Replays the tree into an event stream.
    ///
    /// With `variations` false only the main line is emitted.
    pub fn events(&self, variations: bool) -> Result<Vec<GameEvent>, MoveError> {
        let mut out = Vec::new();
        let mut board = Board::new(self.boardsize);
        walk(&self.root, &mut board, variations, &mut out)?;
        Ok(out)
    }

    pub fn into_record(self, id: i32, variations: bool) -> Result<GameRecord, MoveError> {
        let events = self.events(variations)?;
        Ok(GameRecord::new(id, self.boardsize, events))
    }
}

/// Links nodes into a single line, returning its head.
fn chain(nodes: Vec<GameNode>) -> Option<GameNode> {
    let mut head: Option<GameNode> = None;
    for mut node in nodes.into_iter().rev() {
        if let Some(next) = head.take() {
            node.children.insert(0, next);
        }
        head = Some(node);
    }
    head
}

fn walk(
    node: &GameNode,
    board: &mut Board,
    variations: bool,
    out: &mut Vec<GameEvent>,
) -> Result<(), MoveError> {
    for &(x, y, color) in &node.setup {
        board.place(x, y, color)?;
        out.push(GameEvent::Setup { x, y, color });
    }
    for &(x, y) in &node.clear {
        let removed = board.clear(x, y)?;
        out.push(GameEvent::Clear { x, y, removed });
    }
    match &node.mv {
        Some(NodeMove::Play(x, y, color)) => {
            let captures = board.play(*x, *y, *color)?;
            out.push(GameEvent::Move {
                x: *x,
                y: *y,
                color: *color,
                captures,
            });
        }
        Some(NodeMove::Pass) => out.push(GameEvent::Pass),
        None => {}
    }
    out.push(GameEvent::EndOfNode);

    let n = if variations {
        node.children.len()
    } else {
        node.children.len().min(1)
    };
    for (i, child) in node.children.iter().take(n).enumerate() {
        if i + 1 < n {
            out.push(GameEvent::BranchPoint);
            let mut branch = board.clone();
            walk(child, &mut branch, variations, out)?;
            out.push(GameEvent::EndOfVariation);
        } else {
            walk(child, board, variations, out)?;
        }
    }
    Ok(())
}
