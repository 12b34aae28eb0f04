use anyhow::{Context, Result};
use clap::Parser;
use maze_world_core::{
    AssetCatalog, Cell, EntityKind, EntityRecord, EntitySpec, MapConfig, MapController, MapError,
    MapState, Scenario,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::HashSet,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing_subscriber::{EnvFilter, fmt};

/// Built-in asset catalog used when running the viewer standalone.
const DEMO_ASSETS: &[&str] = &[
    "assets/agent/robot/robot_1.urdf",
    "assets/agent/robot/robot_2.urdf",
    "assets/goal/fruit/apple/apple_1.urdf",
    "assets/goal/fruit/banana/banana_1.urdf",
    "assets/goal/toy/ball/ball_1.urdf",
    "assets/goal/toy/ball/ball_2.urdf",
    "assets/block/brick/brick_1.urdf",
    "assets/block/crate/crate_1.urdf",
    "assets/boundary/wall/wall_1.urdf",
    "assets/boundary/wall/wall_2.urdf",
];

const DEMO_COLORS: &str = "\
// asset color
agent/robot/robot_1.urdf white
agent/robot/robot_2.urdf black
goal/fruit/apple/apple_1.urdf red
goal/fruit/banana/banana_1.urdf yellow
goal/toy/ball/ball_1.urdf blue
goal/toy/ball/ball_2.urdf green
block/brick/brick_1.urdf red
block/crate/crate_1.urdf brown
boundary/wall/wall_1.urdf na
boundary/wall/wall_2.urdf na
";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Map config file (TOML)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Color table to use instead of the built-in one
    #[arg(long, value_name = "PROPERTIES_FILE")]
    colors: Option<PathBuf>,
    /// Side length of the square map
    #[arg(short, long, default_value_t = 9)]
    size: i32,
    #[arg(long, default_value_t = 1)]
    agents: usize,
    #[arg(long, default_value_t = 2)]
    goals: usize,
    #[arg(long, default_value_t = 10)]
    blocks: usize,
    /// Seed for reproducible maps
    #[arg(long)]
    seed: Option<u64>,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// Write logs to this file (nothing is logged otherwise)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

/// Square map with a fixed number of unplaced entities of each kind.
struct DemoScenario {
    size: i32,
    agents: usize,
    goals: usize,
    blocks: usize,
}

impl Scenario for DemoScenario {
    fn configure(&mut self, map: &mut MapState) -> Result<(), MapError> {
        map.set_dims(self.size, self.size)?;
        for (kind, count) in [
            (EntityKind::Agent, self.agents),
            (EntityKind::Goal, self.goals),
            (EntityKind::Block, self.blocks),
        ] {
            for _ in 0..count {
                map.add_entity(EntitySpec::new(kind))?;
            }
        }
        Ok(())
    }
}

struct App {
    controller: MapController<DemoScenario>,
    /// What the simulator side last pulled.
    snapshot: Vec<EntityRecord>,
    /// Remaining cells between the agent and its goal.
    route: Vec<Cell>,
    /// Number of snapshot exchanges this session.
    exchanges: usize,
    status: String,
    should_quit: bool,
    game_over: bool,
}

impl App {
    fn new(config: MapConfig, catalog: AssetCatalog, scenario: DemoScenario) -> Result<Self> {
        let mut app = App {
            controller: MapController::new(config, catalog, scenario),
            snapshot: Vec::new(),
            route: Vec::new(),
            exchanges: 0,
            status: String::new(),
            should_quit: false,
            game_over: false,
        };
        app.reset()?;
        Ok(app)
    }

    fn reset(&mut self) -> Result<()> {
        self.controller.reset()?;
        self.route.clear();
        self.exchanges = 0;
        self.game_over = false;
        self.status = "map reset".to_string();
        self.plan_route()?;
        Ok(())
    }

    /// Plans the agent's route to the nearest reachable goal.
    fn plan_route(&mut self) -> Result<()> {
        let map = self.controller.map_mut();
        let Some(start) = map.agent().and_then(|(agent, _, _)| agent.location) else {
            return Ok(());
        };
        let goals: Vec<Cell> = map.goals().iter().filter_map(|g| g.location).collect();
        let mut best: Option<Vec<Cell>> = None;
        for goal in goals {
            if goal == start {
                continue;
            }
            if let Some(mut path) = map.path_between(start, goal)? {
                path.push(goal);
                if best.as_ref().is_none_or(|b| path.len() < b.len()) {
                    best = Some(path);
                }
            }
        }
        self.route = best.unwrap_or_default();
        self.route.reverse();
        Ok(())
    }

    /// One lock-step exchange: pull if dirty, move the agent one cell, push
    /// the result back.
    fn tick(&mut self) -> Result<()> {
        if self.game_over {
            return Ok(());
        }
        if self.controller.consume_dirty_flag() {
            self.snapshot = self.controller.entity_snapshot();
            tracing::debug!(records = self.snapshot.len(), "pulled snapshot");
        }
        let Some(next) = self.route.pop() else {
            self.status = "no reachable goal".to_string();
            self.game_over = true;
            return Ok(());
        };

        let mut pushed = self.snapshot.clone();
        if let Some(agent) = pushed.iter_mut().find(|r| r.kind == EntityKind::Agent.as_str()) {
            agent.location = Some(next);
        }
        self.controller.apply_external_snapshot(pushed.clone())?;
        self.snapshot = pushed;
        self.exchanges += 1;

        let reached = self.route.is_empty();
        let map = self.controller.map_mut();
        map.set_action_succeeded(true);
        map.set_agent_utterance(format!("moving to {next}"));
        if reached {
            map.set_game_event("goal reached");
            map.record_usage(1.0);
            self.status = format!("goal reached after {} steps", self.exchanges);
            self.game_over = true;
        }
        Ok(())
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_file.as_deref())?;

    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<MapConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => MapConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.max_height = config.max_height.max(args.size);
    config.max_width = config.max_width.max(args.size);

    let mut catalog = AssetCatalog::from_asset_paths(DEMO_ASSETS.iter().copied());
    let colors = match &args.colors {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading color table {}", path.display()))?,
        None => DEMO_COLORS.to_string(),
    };
    catalog.load_color_table("assets", &colors)?;

    let scenario = DemoScenario {
        size: args.size,
        agents: args.agents,
        goals: args.goals,
        blocks: args.blocks,
    };
    // Build the map before touching the terminal so errors print normally.
    let mut app = App::new(config, catalog, scenario)?;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Sends logs to `log_file`; the alternate screen leaves no room for them.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('r') => {
                        if let Err(err) = app.reset() {
                            app.status = format!("reset failed: {err}");
                            app.game_over = true;
                        }
                    }
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            if let Err(err) = app.tick() {
                app.status = format!("exchange failed: {err}");
                app.game_over = true;
            }
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70),
            Constraint::Percentage(20),
            Constraint::Percentage(10),
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], app);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("Press 'r' for a new map, 'q' or 'Esc' to quit.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders session values and entity counts.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let map = app.controller.map();
    let session = map.session();
    let (height, width) = map.dims().unwrap_or_default();
    let lines = vec![
        Line::from(format!(
            "Map {height}x{width}  agents {}  goals {}  blocks {}  free {}  walls {}",
            map.count(EntityKind::Agent),
            map.count(EntityKind::Goal),
            map.count(EntityKind::Block),
            map.free_cells().len(),
            map.boundaries().len(),
        )),
        Line::from(format!(
            "Phase {:?}  exchanges {}  last action ok: {}",
            app.controller.phase(),
            app.exchanges,
            session.last_action_succeeded
        )),
        Line::from(format!("Agent says: {}", session.agent_utterance)),
        Line::from(format!("Event: {}  Status: {}", session.last_event, app.status)),
    ];
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Session"));
    frame.render_widget(widget, area);
}

fn glyph_style(glyph: char) -> Style {
    match glyph {
        'A' => Style::default().fg(Color::Red).bold(),
        'G' => Style::default().fg(Color::Green),
        'B' => Style::default().fg(Color::Gray),
        '#' => Style::default().fg(Color::DarkGray),
        '*' => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    }
}

/// Renders the grid dump inside its boundary ring, with the planned route.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let map = app.controller.map();
    let Ok(grid) = map.grid_dump() else {
        frame.render_widget(Paragraph::new("no map"), area);
        return;
    };
    let route: HashSet<Cell> = app.route.iter().copied().collect();
    let wall = EntityKind::Boundary.glyph();
    let ring_row = || Line::from(Span::styled(
        wall.to_string().repeat(grid.width() + 2),
        glyph_style(wall),
    ));

    let mut lines: Vec<Line> = Vec::with_capacity(grid.height() + 2);
    lines.push(ring_row());
    for (y, row) in grid.rows().enumerate() {
        let mut spans: Vec<Span> = Vec::with_capacity(row.len() + 2);
        spans.push(Span::styled(wall.to_string(), glyph_style(wall)));
        for (x, glyph) in row.iter().enumerate() {
            let glyph = match *glyph {
                '.' if route.contains(&Cell::ground(x as i32, y as i32)) => '*',
                '.' => ' ',
                other => other,
            };
            spans.push(Span::styled(glyph.to_string(), glyph_style(glyph)));
        }
        spans.push(Span::styled(wall.to_string(), glyph_style(wall)));
        lines.push(Line::from(spans));
    }
    lines.push(ring_row());

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Maze World").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}
