//! Kombilo-Rust command line.
//!
//! ## Usage
//!
//! - `kombilo-rust demo` - Search a small scripted collection
//! - `kombilo-rust bench --db DIR` - Build a random collection and search it

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use kombilo_rust::board::{Board, Color};
use kombilo_rust::game::{GameNode, GameTree, NodeMove};
use kombilo_rust::gamelist::GameList;
use kombilo_rust::options::{ALGO_HASH_CORNER, ALGO_HASH_FULL, ProcessOptions, SearchOptions};
use kombilo_rust::pattern::{Pattern, PatternKind};

/// Kombilo-Rust: pattern search in Go game collections
#[derive(Parser)]
#[command(name = "kombilo-rust")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a small scripted collection and print the results
    Demo,
    /// Build a random collection and search it
    Bench(BenchArgs),
}

#[derive(Copy, Clone, ValueEnum)]
enum Kind {
    Full,
    Nw,
    Ne,
    Se,
    Sw,
    N,
    E,
    S,
    W,
    Center,
}

impl From<Kind> for PatternKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Full => PatternKind::FullBoard,
            Kind::Nw => PatternKind::CornerNW,
            Kind::Ne => PatternKind::CornerNE,
            Kind::Se => PatternKind::CornerSE,
            Kind::Sw => PatternKind::CornerSW,
            Kind::N => PatternKind::SideN,
            Kind::E => PatternKind::SideE,
            Kind::S => PatternKind::SideS,
            Kind::W => PatternKind::SideW,
            Kind::Center => PatternKind::Center,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum Player {
    B,
    W,
}

#[derive(clap::Args)]
struct BenchArgs {
    /// Database directory
    #[arg(long, default_value = "kombilo-db")]
    db: PathBuf,

    /// Number of random games to add when the database is empty
    #[arg(long, default_value_t = 500)]
    games: usize,

    /// Moves per game
    #[arg(long, default_value_t = 120)]
    moves: usize,

    #[arg(long, default_value_t = 19)]
    boardsize: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Pattern rows separated by '/'
    #[arg(long, default_value = "......./......./......./...X.../......./......./.......")]
    pattern: String,

    #[arg(long, value_enum, default_value = "nw")]
    kind: Kind,

    /// Only count occurrences continued by this player
    #[arg(long, value_enum)]
    next_move: Option<Player>,

    #[arg(long)]
    fixed_color: bool,

    #[arg(long, default_value_t = 10000)]
    move_limit: u32,

    /// Accept full-board hash hits without replaying the games
    #[arg(long)]
    trust_hash_full: bool,

    /// Only search the main line of each game
    #[arg(long)]
    no_variations: bool,

    /// Do not use the hash indexes
    #[arg(long)]
    no_hash: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    use std::io::Write;
    let log_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, log_level),
    )
    .format(|buf, record| {
        writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
    })
    .write_style(env_logger::WriteStyle::Never)
    .target(env_logger::Target::Stderr)
    .init();

    match cli.command {
        Some(Commands::Bench(args)) => run_bench(&args),
        Some(Commands::Demo) | None => run_demo(),
    }
}

fn parse_pattern(rows: &str, kind: PatternKind, boardsize: usize) -> Result<Pattern> {
    let rows: Vec<&str> = rows.split('/').map(str::trim).collect();
    let width = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != width) {
        bail!("pattern rows must all have the same length");
    }
    let size_x = if kind == PatternKind::FullBoard { boardsize } else { width };
    let size_y = if kind == PatternKind::FullBoard { boardsize } else { rows.len() };
    Pattern::new(kind, boardsize, size_x, size_y, &rows.concat()).context("invalid pattern")
}

fn print_results(games: &GameList) {
    let summary = games.summary();
    println!(
        "{} hits in {} games ({} color-switched), Black wins {}, White wins {}, via {:?}",
        summary.num_hits,
        summary.num_games,
        summary.num_switched,
        summary.b_wins,
        summary.w_wins,
        summary.strategy
    );
    for r in games.results().iter().take(20) {
        let hits: Vec<String> = r
            .hits
            .iter()
            .map(|h| match h.label.point {
                Some((x, y)) => format!("{}@({x},{y}){}", h.position, if h.label.color_switch { "*" } else { "" }),
                None => format!("{}@end{}", h.position, if h.label.color_switch { "*" } else { "" }),
            })
            .collect();
        println!("  game {}: {}", r.game_id, hits.join(" "));
    }
    if games.results().len() > 20 {
        println!("  ... {} more games", games.results().len() - 20);
    }

    let (Some(plist), Some(conts)) = (games.pattern(), games.continuations()) else {
        return;
    };
    let p = &plist.pattern;
    println!("\nPattern and continuation labels:");
    let labels = games.labels();
    for j in 0..p.size_y {
        let row: String = (0..p.size_x)
            .map(|i| {
                let l = labels.get(i + p.size_x * j).copied().unwrap_or(b'.');
                if l != b'.' { l as char } else { p.get(i, j) as char }
            })
            .collect();
        println!("  {row}");
    }
    let per_year = games.games_per_year();
    for c in conts.played().filter(|c| c.label != b'.') {
        println!(
            "  {}: B {} W {} (tenuki {}/{}), B wins {}/{}, W wins {}/{}, avg date {:.1}",
            c.label as char,
            c.black,
            c.white,
            c.tenuki_black,
            c.tenuki_white,
            c.wins_b,
            c.wins_b + c.losses_b,
            c.wins_w,
            c.wins_w + c.losses_w,
            c.average_date(None, &per_year)
        );
    }
}

fn run_demo() -> Result<()> {
    println!("Kombilo-Rust: pattern search demo\n");
    let dir = std::env::temp_dir().join(format!("kombilo-demo-{}", std::process::id()));
    let mut games = GameList::open(&dir, 19, ProcessOptions::default())
        .with_context(|| format!("cannot open {}", dir.display()))?;

    // Three short openings in different corners, one with a variation.
    let mut a = GameTree::from_moves(19, &[(2, 3), (15, 15), (4, 2), (3, 15), (15, 3)]);
    a.add_line(&[0, 0], vec![GameNode::play(3, 5, Color::Black)]);
    let b = GameTree::from_moves(19, &[(16, 15), (3, 3), (14, 16), (15, 3), (16, 16)]);
    let c = GameTree::from_moves(19, &[(3, 3), (15, 15), (16, 3), (2, 15)]);
    for (id, tree, winner, year) in [
        (1, a, Some(Color::Black), 1985),
        (2, b, Some(Color::White), 1995),
        (3, c, None, 2005),
    ] {
        let record = tree
            .into_record(id, true)
            .with_context(|| format!("game {id}"))?
            .with_winner(winner)
            .with_date(year, 1);
        games.add_game(&record)?;
    }
    games.commit()?;

    let pattern = Pattern::new(
        PatternKind::CornerNW,
        19,
        6,
        6,
        "
        ......
        ......
        ......
        ..X...
        ......
        ......",
    )?;
    println!("{pattern}");
    games.search(pattern, &SearchOptions::default())?;
    print_results(&games);

    std::fs::remove_dir_all(&dir).with_context(|| format!("cannot remove {}", dir.display()))?;
    Ok(())
}

/// Plays up to `len` random legal moves starting with `color`.
fn random_line(rng: &mut fastrand::Rng, board: &mut Board, mut color: Color, len: usize) -> Vec<GameNode> {
    let bs = board.size;
    let mut nodes = Vec::with_capacity(len);
    for _ in 0..len {
        for _ in 0..20 {
            let (x, y) = (rng.usize(..bs), rng.usize(..bs));
            if board.play(x, y, color).is_ok() {
                nodes.push(GameNode::play(x, y, color));
                break;
            }
        }
        color = color.opponent();
    }
    nodes
}

fn random_game(rng: &mut fastrand::Rng, boardsize: usize, moves: usize) -> GameTree {
    let mut tree = GameTree::new(boardsize);
    let mut board = Board::new(boardsize);
    let line = random_line(rng, &mut board, Color::Black, moves);
    let played: Vec<(usize, usize, Color)> = line
        .iter()
        .filter_map(|n| match n.mv {
            Some(NodeMove::Play(x, y, c)) => Some((x, y, c)),
            _ => None,
        })
        .collect();
    tree.add_line(&[], line);

    if played.len() > 2 && rng.u8(..4) == 0 {
        let at = rng.usize(1..played.len());
        let mut board = Board::new(boardsize);
        for &(x, y, c) in &played[..at] {
            let _ = board.play(x, y, c);
        }
        let next = played[at - 1].2.opponent();
        let len = rng.usize(1..8);
        let variation = random_line(rng, &mut board, next, len);
        tree.add_line(&vec![0; at], variation);
    }
    tree
}

fn build_corpus(games: &mut GameList, args: &BenchArgs) -> Result<()> {
    let mut rng = fastrand::Rng::with_seed(args.seed);
    let start = Instant::now();
    for id in 0..args.games {
        let tree = random_game(&mut rng, args.boardsize, args.moves);
        let winner = match rng.u8(..3) {
            0 => Some(Color::Black),
            1 => Some(Color::White),
            _ => None,
        };
        let record = tree
            .into_record(id as i32, true)
            .with_context(|| format!("random game {id}"))?
            .with_winner(winner)
            .with_date(rng.i32(1950..2020), rng.i32(1..=12));
        games.add_game(&record)?;
    }
    games.commit()?;
    log::info!("processed {} games in {:.2?}", args.games, start.elapsed());
    Ok(())
}

fn open_db(path: &Path, boardsize: usize) -> Result<GameList> {
    GameList::open(path, boardsize, ProcessOptions::default())
        .with_context(|| format!("cannot open database {}", path.display()))
}

fn run_bench(args: &BenchArgs) -> Result<()> {
    let mut games = open_db(&args.db, args.boardsize)?;
    if games.num_games() == 0 {
        build_corpus(&mut games, args)?;
    }

    let pattern = parse_pattern(&args.pattern, args.kind.into(), args.boardsize)?;
    let mut options = SearchOptions {
        fixed_color: args.fixed_color,
        next_move: args.next_move.map(|p| match p {
            Player::B => Color::Black,
            Player::W => Color::White,
        }),
        move_limit: args.move_limit,
        trust_hash_full: args.trust_hash_full,
        search_in_variations: !args.no_variations,
        ..Default::default()
    };
    if args.no_hash {
        options.algos = options.algos.without(ALGO_HASH_FULL).without(ALGO_HASH_CORNER);
    }

    let start = Instant::now();
    games.search(pattern, &options)?;
    log::info!("search took {:.2?}", start.elapsed());
    print_results(&games);
    Ok(())
}
