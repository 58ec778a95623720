//! Map presets, difficulty tuning and the lobby catalogue
//!
//! The catalogue is static data: given a map id and a difficulty it produces
//! an immutable grid plus the initial camera and loot lists for a match.

use serde::{Deserialize, Serialize};

/// Map used when a room never picked one (or picked an unknown id)
pub const DEFAULT_MAP_ID: &str = "bank";

/// Match difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Final score multiplier
    pub fn score_multiplier(&self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 1.5,
            Difficulty::Hard => 2.0,
        }
    }

    pub fn tuning(&self) -> DifficultyTuning {
        match self {
            Difficulty::Easy => DifficultyTuning {
                countdown_seconds: 240,
                alarm_decay_per_tick: 2.0,
                alarm_spike_probability_per_tick: 0.03,
                camera_detect_increment: 3.0,
                loot_alarm_base_increment: 5.0,
            },
            Difficulty::Medium => DifficultyTuning {
                countdown_seconds: 180,
                alarm_decay_per_tick: 1.0,
                alarm_spike_probability_per_tick: 0.05,
                camera_detect_increment: 5.0,
                loot_alarm_base_increment: 10.0,
            },
            Difficulty::Hard => DifficultyTuning {
                countdown_seconds: 120,
                alarm_decay_per_tick: 0.5,
                alarm_spike_probability_per_tick: 0.08,
                camera_detect_increment: 8.0,
                loot_alarm_base_increment: 15.0,
            },
        }
    }

    fn camera_mods(&self) -> CameraMods {
        match self {
            Difficulty::Easy => CameraMods {
                rotation_speed: 15.0,
                fov_angle: 50.0,
                fov_range: 3.0,
            },
            Difficulty::Medium => CameraMods {
                rotation_speed: 25.0,
                fov_angle: 60.0,
                fov_range: 4.0,
            },
            Difficulty::Hard => CameraMods {
                rotation_speed: 40.0,
                fov_angle: 70.0,
                fov_range: 5.0,
            },
        }
    }
}

/// Numeric constants that vary with the selected difficulty
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyTuning {
    /// Match length in seconds
    pub countdown_seconds: u32,
    /// Alarm points removed by each decay step (every 4th tick)
    pub alarm_decay_per_tick: f64,
    /// Chance of a random alarm spike on any given tick
    pub alarm_spike_probability_per_tick: f64,
    /// Alarm points added when a camera spots the crew
    pub camera_detect_increment: f64,
    /// Alarm points added on loot pickup, before jitter
    pub loot_alarm_base_increment: f64,
}

#[derive(Debug, Clone, Copy)]
struct CameraMods {
    rotation_speed: f64,
    fov_angle: f64,
    fov_range: f64,
}

/// Kind of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Floor,
    Wall,
    Door,
    Entry,
    Exit,
}

/// Integer grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Immutable cell grid, indexed `cells[y][x]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub name: &'static str,
    pub width: i32,
    pub height: i32,
    pub cells: Vec<Vec<CellKind>>,
}

impl Grid {
    /// Cell at a position; anything outside the grid reads as wall
    pub fn cell_at(&self, pos: Position) -> CellKind {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return CellKind::Wall;
        }
        self.cells[pos.y as usize][pos.x as usize]
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.cell_at(pos) != CellKind::Wall
    }

    fn set(&mut self, x: i32, y: i32, kind: CellKind) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.cells[y as usize][x as usize] = kind;
        }
    }

    fn carve(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            let cell = &mut self.cells[y as usize][x as usize];
            if *cell == CellKind::Wall {
                *cell = CellKind::Floor;
            }
        }
    }
}

/// Cardinal facing used for camera placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

impl Facing {
    /// Facing in degrees, 0 = +x, 90 = +y (screen down)
    pub fn degrees(&self) -> f64 {
        match self {
            Facing::Right => 0.0,
            Facing::Down => 90.0,
            Facing::Left => 180.0,
            Facing::Up => 270.0,
        }
    }
}

/// Loot categories and their fixed values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LootKind {
    Diamond,
    Gold,
    Cash,
    Artifact,
    Jewel,
}

impl LootKind {
    pub fn value(&self) -> u32 {
        match self {
            LootKind::Diamond => 150,
            LootKind::Gold => 100,
            LootKind::Cash => 50,
            LootKind::Artifact => 200,
            LootKind::Jewel => 75,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LootKind::Diamond => "diamond",
            LootKind::Gold => "gold",
            LootKind::Cash => "cash",
            LootKind::Artifact => "artifact",
            LootKind::Jewel => "jewel",
        }
    }
}

struct RoomRect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

struct Corridor {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

struct CameraPlacement {
    x: i32,
    y: i32,
    facing: Facing,
    rotates: bool,
}

struct LootPlacement {
    x: i32,
    y: i32,
    kind: LootKind,
}

struct MapPreset {
    id: &'static str,
    name: &'static str,
    difficulty: Difficulty,
    width: i32,
    height: i32,
    rooms: &'static [RoomRect],
    corridors: &'static [Corridor],
    doors: &'static [(i32, i32)],
    entry: Position,
    exit: Position,
    cameras: &'static [CameraPlacement],
    loot: &'static [LootPlacement],
}

const fn room(x: i32, y: i32, w: i32, h: i32) -> RoomRect {
    RoomRect { x, y, w, h }
}

const fn corridor(x1: i32, y1: i32, x2: i32, y2: i32) -> Corridor {
    Corridor { x1, y1, x2, y2 }
}

const fn camera(x: i32, y: i32, facing: Facing, rotates: bool) -> CameraPlacement {
    CameraPlacement {
        x,
        y,
        facing,
        rotates,
    }
}

const fn loot(x: i32, y: i32, kind: LootKind) -> LootPlacement {
    LootPlacement { x, y, kind }
}

static PRESETS: [MapPreset; 3] = [
    MapPreset {
        id: "bank",
        name: "The Bank",
        difficulty: Difficulty::Easy,
        width: 20,
        height: 15,
        rooms: &[
            room(1, 10, 5, 4),
            room(13, 1, 6, 5),
            room(7, 3, 5, 4),
            room(7, 9, 6, 4),
            room(1, 2, 4, 4),
        ],
        corridors: &[
            corridor(5, 12, 7, 12),
            corridor(7, 7, 7, 9),
            corridor(4, 4, 7, 4),
            corridor(12, 5, 12, 9),
            corridor(12, 5, 13, 5),
            corridor(10, 11, 15, 11),
        ],
        doors: &[(6, 12), (7, 7), (12, 6), (13, 3)],
        entry: Position::new(2, 12),
        exit: Position::new(16, 3),
        cameras: &[
            camera(10, 5, Facing::Down, false),
            camera(15, 2, Facing::Left, false),
            camera(5, 4, Facing::Right, false),
            camera(13, 10, Facing::Up, false),
        ],
        loot: &[
            loot(17, 2, LootKind::Diamond),
            loot(15, 4, LootKind::Gold),
            loot(9, 4, LootKind::Cash),
            loot(8, 11, LootKind::Jewel),
            loot(3, 3, LootKind::Artifact),
        ],
    },
    MapPreset {
        id: "museum",
        name: "The Museum",
        difficulty: Difficulty::Medium,
        width: 24,
        height: 16,
        rooms: &[
            room(1, 12, 4, 3),
            room(19, 1, 4, 4),
            room(8, 1, 6, 4),
            room(1, 1, 5, 5),
            room(8, 8, 8, 5),
            room(18, 8, 5, 6),
        ],
        corridors: &[
            corridor(3, 12, 3, 8),
            corridor(3, 8, 8, 8),
            corridor(5, 3, 8, 3),
            corridor(14, 3, 19, 3),
            corridor(14, 3, 14, 8),
            corridor(16, 10, 18, 10),
            corridor(20, 5, 20, 8),
        ],
        doors: &[(3, 11), (6, 3), (17, 3), (17, 10), (20, 6)],
        entry: Position::new(2, 13),
        exit: Position::new(21, 2),
        cameras: &[
            camera(11, 2, Facing::Down, true),
            camera(3, 2, Facing::Right, true),
            camera(12, 10, Facing::Left, true),
            camera(20, 10, Facing::Up, false),
            camera(18, 4, Facing::Down, true),
        ],
        loot: &[
            loot(21, 3, LootKind::Diamond),
            loot(10, 2, LootKind::Artifact),
            loot(2, 3, LootKind::Artifact),
            loot(12, 11, LootKind::Gold),
            loot(20, 12, LootKind::Jewel),
            loot(21, 9, LootKind::Gold),
        ],
    },
    MapPreset {
        id: "fortress",
        name: "The Fortress",
        difficulty: Difficulty::Hard,
        width: 26,
        height: 18,
        rooms: &[
            room(1, 14, 4, 3),
            room(21, 1, 4, 4),
            room(11, 7, 4, 4),
            room(1, 1, 5, 5),
            room(1, 7, 4, 5),
            room(7, 1, 5, 4),
            room(14, 1, 5, 4),
            room(17, 7, 4, 5),
            room(7, 13, 6, 4),
            room(17, 13, 5, 4),
        ],
        corridors: &[
            corridor(4, 14, 7, 14),
            corridor(3, 6, 3, 7),
            corridor(3, 12, 3, 14),
            corridor(5, 3, 7, 3),
            corridor(12, 3, 14, 3),
            corridor(19, 3, 21, 3),
            corridor(15, 9, 17, 9),
            corridor(11, 9, 11, 11),
            corridor(9, 11, 11, 11),
            corridor(9, 11, 9, 13),
            corridor(13, 15, 17, 15),
            corridor(19, 12, 19, 13),
            corridor(21, 5, 21, 7),
            corridor(19, 7, 21, 7),
        ],
        doors: &[
            (5, 14),
            (3, 6),
            (6, 3),
            (13, 3),
            (20, 3),
            (16, 9),
            (10, 14),
            (19, 12),
            (21, 6),
        ],
        entry: Position::new(2, 15),
        exit: Position::new(23, 2),
        cameras: &[
            camera(9, 2, Facing::Down, true),
            camera(16, 2, Facing::Down, true),
            camera(13, 9, Facing::Right, true),
            camera(3, 9, Facing::Right, true),
            camera(19, 9, Facing::Left, true),
            camera(10, 15, Facing::Up, true),
            camera(22, 4, Facing::Left, false),
        ],
        loot: &[
            loot(23, 3, LootKind::Diamond),
            loot(22, 2, LootKind::Diamond),
            loot(13, 9, LootKind::Artifact),
            loot(2, 2, LootKind::Gold),
            loot(9, 14, LootKind::Gold),
            loot(19, 15, LootKind::Jewel),
            loot(2, 9, LootKind::Cash),
        ],
    },
];

/// Half-width of a rotating camera's sweep, in degrees
const SWEEP_HALF_WIDTH: f64 = 45.0;

/// Camera as placed on a fresh map
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSpawn {
    pub position: Position,
    pub facing: Facing,
    pub rotates: bool,
    pub fov_angle: f64,
    pub fov_range: f64,
    pub rotation_speed: f64,
    pub min_angle: f64,
    pub max_angle: f64,
}

/// Loot as placed on a fresh map
#[derive(Debug, Clone, PartialEq)]
pub struct LootSpawn {
    pub position: Position,
    pub kind: LootKind,
}

/// Everything a match needs from the catalogue
#[derive(Debug, Clone)]
pub struct Layout {
    pub map_id: &'static str,
    pub grid: Grid,
    pub entry: Position,
    pub exit: Position,
    pub cameras: Vec<CameraSpawn>,
    pub loot: Vec<LootSpawn>,
    pub tuning: DifficultyTuning,
}

/// Lobby listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub difficulty: Difficulty,
    pub size: String,
    pub width: i32,
    pub height: i32,
    pub loot_count: usize,
    pub camera_count: usize,
}

fn preset(map_id: &str) -> &'static MapPreset {
    PRESETS
        .iter()
        .find(|p| p.id == map_id)
        .unwrap_or(&PRESETS[0])
}

/// Whether the catalogue knows a map id
pub fn is_known_map(map_id: &str) -> bool {
    PRESETS.iter().any(|p| p.id == map_id)
}

/// List all presets for lobby display
pub fn catalogue() -> Vec<MapSummary> {
    PRESETS
        .iter()
        .map(|p| MapSummary {
            id: p.id,
            name: p.name,
            difficulty: p.difficulty,
            size: format!("{}x{}", p.width, p.height),
            width: p.width,
            height: p.height,
            loot_count: p.loot.len(),
            camera_count: p.cameras.len(),
        })
        .collect()
}

/// Build the layout for a map and difficulty. Unknown ids fall back to the
/// default map.
pub fn build_layout(map_id: &str, difficulty: Difficulty) -> Layout {
    let preset = preset(map_id);
    Layout {
        map_id: preset.id,
        grid: build_grid(preset),
        entry: preset.entry,
        exit: preset.exit,
        cameras: build_cameras(preset, difficulty),
        loot: preset
            .loot
            .iter()
            .map(|l| LootSpawn {
                position: Position::new(l.x, l.y),
                kind: l.kind,
            })
            .collect(),
        tuning: difficulty.tuning(),
    }
}

fn build_grid(preset: &MapPreset) -> Grid {
    let mut grid = Grid {
        name: preset.name,
        width: preset.width,
        height: preset.height,
        cells: vec![vec![CellKind::Wall; preset.width as usize]; preset.height as usize],
    };

    for r in preset.rooms {
        for y in r.y..r.y + r.h {
            for x in r.x..r.x + r.w {
                grid.set(x, y, CellKind::Floor);
            }
        }
    }

    // Horizontal leg along y1, then vertical leg along x2
    for c in preset.corridors {
        for x in c.x1.min(c.x2)..=c.x1.max(c.x2) {
            grid.carve(x, c.y1);
        }
        for y in c.y1.min(c.y2)..=c.y1.max(c.y2) {
            grid.carve(c.x2, y);
        }
    }

    for &(x, y) in preset.doors {
        grid.set(x, y, CellKind::Door);
    }

    grid.set(preset.entry.x, preset.entry.y, CellKind::Entry);
    grid.set(preset.exit.x, preset.exit.y, CellKind::Exit);
    grid
}

fn build_cameras(preset: &MapPreset, difficulty: Difficulty) -> Vec<CameraSpawn> {
    let mods = difficulty.camera_mods();
    preset
        .cameras
        .iter()
        .map(|c| {
            let base = c.facing.degrees();
            CameraSpawn {
                position: Position::new(c.x, c.y),
                facing: c.facing,
                rotates: c.rotates,
                fov_angle: mods.fov_angle,
                fov_range: mods.fov_range,
                rotation_speed: if c.rotates { mods.rotation_speed } else { 0.0 },
                min_angle: base - SWEEP_HALF_WIDTH,
                max_angle: base + SWEEP_HALF_WIDTH,
            }
        })
        .collect()
}
