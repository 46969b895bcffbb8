// Scanner111 - app/config.rs
//
// Configuration loading: batch options (settings.toml) and per-game data
// documents (suspect patterns, expected settings, ignore lists, hashes,
// FormID database names).
//
// Built-in game documents are embedded in the binary; a file with the same
// name in the configuration directory replaces the built-in wholesale.
// After `ConfigurationCache::load` returns, the cache is read-only and
// freely shared across the batch.

use crate::core::model::Game;
use crate::util::constants;
use crate::util::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Batch options
// =============================================================================

/// Options controlling one batch scan. Loaded from `settings.toml` when
/// present, then overridden field-by-field from the CLI.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanOptions {
    /// Resolve FormID values against the reference databases.
    pub show_form_id_values: bool,

    /// Run the file-integrity (FCX) checks.
    pub fcx_mode: bool,

    /// Omit per-item detail lines that only concern ignored plugins.
    pub simplify_logs: bool,

    /// Move invalid-or-incomplete logs into a sibling Unsolved/ directory.
    pub move_unsolved_logs: bool,

    /// Number of logs analysed concurrently (clamped to 1..=100).
    pub max_concurrent: usize,

    /// Per-log wall-clock deadline in seconds.
    pub log_timeout_secs: u64,

    /// Named filesystem locations, e.g. "game_root" or "formid_db_dir".
    pub custom_paths: BTreeMap<String, String>,

    /// Game whose configuration is used when a log's header is ambiguous
    /// about paths (reports always follow the header's detected game).
    pub selected_game: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            show_form_id_values: false,
            fcx_mode: false,
            simplify_logs: false,
            move_unsolved_logs: false,
            max_concurrent: constants::DEFAULT_MAX_CONCURRENT,
            log_timeout_secs: constants::DEFAULT_LOG_TIMEOUT_SECS,
            custom_paths: BTreeMap::new(),
            selected_game: "Fallout4".to_string(),
        }
    }
}

impl ScanOptions {
    /// Load options from `settings.toml` under `config_dir`, falling back
    /// to defaults when the file does not exist.
    pub fn load(config_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(dir) = config_dir else {
            return Ok(Self::default());
        };
        let path = dir.join(constants::SETTINGS_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut options: ScanOptions =
            toml::from_str(&text).map_err(|e| ConfigError::TomlParse {
                path: path.clone(),
                source: e,
            })?;
        options.validate()?;
        tracing::debug!(path = %path.display(), "Options loaded");
        Ok(options)
    }

    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.max_concurrent < constants::MIN_MAX_CONCURRENT
            || self.max_concurrent > constants::MAX_MAX_CONCURRENT
        {
            return Err(ConfigError::ValueOutOfRange {
                field: "max_concurrent".to_string(),
                value: self.max_concurrent.to_string(),
                expected: format!(
                    "{}..={}",
                    constants::MIN_MAX_CONCURRENT,
                    constants::MAX_MAX_CONCURRENT
                ),
            });
        }
        if crate::core::model::Game::from_key(&self.selected_game).is_none() {
            return Err(ConfigError::ValueOutOfRange {
                field: "selected_game".to_string(),
                value: self.selected_game.clone(),
                expected: "one of Fallout4, Fallout4VR, SkyrimSE, SkyrimVR".to_string(),
            });
        }
        Ok(())
    }

    /// The configured game-installation root, if any.
    pub fn game_root(&self) -> Option<PathBuf> {
        self.custom_paths
            .get(constants::GAME_ROOT_PATH_KEY)
            .map(PathBuf::from)
    }
}

// =============================================================================
// Suspect patterns
// =============================================================================

/// A literal-substring signature matched against the header's main error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPattern {
    pub label: String,
    pub substring: String,
    pub severity: u8,
}

/// An ordered sequence of substrings matched against the callstack: each
/// element must be found at or after the position of the previous match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPattern {
    pub label: String,
    pub sequence: Vec<String>,
    pub severity: u8,
}

// =============================================================================
// Per-game configuration (raw TOML definition)
// =============================================================================

#[derive(Debug, Deserialize)]
struct GameConfigDef {
    game: GameMetaDef,
    #[serde(default)]
    expected_settings: BTreeMap<String, String>,
    #[serde(default)]
    ignore_plugins: Vec<String>,
    #[serde(default)]
    executable_hashes: BTreeMap<String, String>,
    #[serde(default)]
    formid_databases: Vec<String>,
    #[serde(default)]
    formid_table: String,
    #[serde(default)]
    suspects: SuspectsDef,
}

#[derive(Debug, Deserialize)]
struct GameMetaDef {
    name: String,
    executable: String,
    crashgen_name: String,
    crashgen_config_file: String,
    latest_crashgen_version: String,
    latest_crashgen_version_vr: String,
    #[serde(default)]
    update_url: String,
    #[serde(default)]
    xcell_update_url: String,
    #[serde(default)]
    xcell_modules: Vec<String>,
    #[serde(default)]
    old_xcell_modules: Vec<String>,
    #[serde(default)]
    baka_modules: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SuspectsDef {
    #[serde(default)]
    error: Vec<ErrorPatternDef>,
    #[serde(default)]
    stack: Vec<StackPatternDef>,
}

#[derive(Debug, Deserialize)]
struct ErrorPatternDef {
    label: String,
    substring: String,
    severity: u8,
}

#[derive(Debug, Deserialize)]
struct StackPatternDef {
    label: String,
    sequence: Vec<String>,
    severity: u8,
}

// =============================================================================
// Per-game configuration (validated runtime form)
// =============================================================================

/// Validated per-game data used by the analyzers.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub game: Game,
    pub display_name: String,
    pub executable: String,
    pub crashgen_name: String,
    pub crashgen_config_file: String,
    pub latest_crashgen_version: String,
    pub latest_crashgen_version_vr: String,
    pub update_url: String,
    pub xcell_update_url: String,

    /// XSE module names identifying an XCell installation (lower-case).
    pub xcell_modules: Vec<String>,

    /// XSE module names identifying an outdated XCell (lower-case).
    pub old_xcell_modules: Vec<String>,

    /// XSE module names identifying Baka ScrapHeap (lower-case).
    pub baka_modules: Vec<String>,

    /// Expected crash-generator settings, keyed by the setting's display
    /// spelling; comparisons against the log are case-insensitive.
    pub expected_settings: BTreeMap<String, String>,

    /// Plugins never reported as suspects (lower-case).
    pub ignore_plugins: Vec<String>,

    /// SHA-256 digests of known-good executables, keyed by game version.
    pub executable_hashes: BTreeMap<String, String>,

    /// FormID database file names, tried in order until a hit.
    pub formid_databases: Vec<String>,

    /// Table name inside the FormID databases.
    pub formid_table: String,

    /// Error signatures, sorted by descending severity then label.
    pub error_patterns: Vec<ErrorPattern>,

    /// Callstack signatures, sorted by descending severity then label.
    pub stack_patterns: Vec<StackPattern>,
}

impl GameConfig {
    /// The latest crash-generator version for this game's variant.
    pub fn latest_crashgen_for(&self, vr: bool) -> &str {
        if vr {
            &self.latest_crashgen_version_vr
        } else {
            &self.latest_crashgen_version
        }
    }

    pub fn is_ignored_plugin(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.ignore_plugins.iter().any(|p| *p == lower)
    }
}

fn validate_game_config(
    game: Game,
    def: GameConfigDef,
) -> Result<GameConfig, ConfigError> {
    let mut seen = Vec::new();
    for pattern in &def.suspects.error {
        if seen.contains(&&pattern.label) {
            return Err(ConfigError::DuplicateLabel {
                game: game.key().to_string(),
                label: pattern.label.clone(),
            });
        }
        seen.push(&pattern.label);
    }
    let mut seen = Vec::new();
    for pattern in &def.suspects.stack {
        if seen.contains(&&pattern.label) {
            return Err(ConfigError::DuplicateLabel {
                game: game.key().to_string(),
                label: pattern.label.clone(),
            });
        }
        seen.push(&pattern.label);
    }

    let lower = |v: Vec<String>| -> Vec<String> {
        v.into_iter().map(|s| s.to_ascii_lowercase()).collect()
    };

    let mut error_patterns: Vec<ErrorPattern> = def
        .suspects
        .error
        .into_iter()
        .map(|p| ErrorPattern {
            label: p.label,
            substring: p.substring,
            severity: p.severity,
        })
        .collect();
    // Report ordering is fixed at load time: descending severity, then
    // ascending label. Matching preserves this order.
    error_patterns.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.label.cmp(&b.label)));

    let mut stack_patterns: Vec<StackPattern> = def
        .suspects
        .stack
        .into_iter()
        .filter(|p| !p.sequence.is_empty())
        .map(|p| StackPattern {
            label: p.label,
            sequence: p.sequence,
            severity: p.severity,
        })
        .collect();
    stack_patterns.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.label.cmp(&b.label)));

    Ok(GameConfig {
        game,
        display_name: def.game.name,
        executable: def.game.executable,
        crashgen_name: def.game.crashgen_name,
        crashgen_config_file: def.game.crashgen_config_file,
        latest_crashgen_version: def.game.latest_crashgen_version,
        latest_crashgen_version_vr: def.game.latest_crashgen_version_vr,
        update_url: def.game.update_url,
        xcell_update_url: def.game.xcell_update_url,
        xcell_modules: lower(def.game.xcell_modules),
        old_xcell_modules: lower(def.game.old_xcell_modules),
        baka_modules: lower(def.game.baka_modules),
        expected_settings: def.expected_settings,
        ignore_plugins: lower(def.ignore_plugins),
        executable_hashes: def.executable_hashes,
        formid_databases: def.formid_databases,
        formid_table: def.formid_table,
        error_patterns,
        stack_patterns,
    })
}

// =============================================================================
// Configuration cache
// =============================================================================

/// Embedded TOML content for built-in game documents.
/// Each tuple is (game, TOML content).
fn builtin_game_sources() -> Vec<(Game, &'static str)> {
    let sources = vec![
        (Game::Fallout4, include_str!("../../config/Fallout4.toml")),
        (
            Game::Fallout4Vr,
            include_str!("../../config/Fallout4VR.toml"),
        ),
    ];
    #[cfg(feature = "skyrim")]
    {
        sources.push((Game::SkyrimSe, include_str!("../../config/SkyrimSE.toml")));
        sources.push((Game::SkyrimVr, include_str!("../../config/SkyrimVR.toml")));
    }
    sources
}

/// Loaded and memoized configuration: options plus per-game data sets.
/// Initialised once before a batch starts; read-only afterwards.
#[derive(Debug)]
pub struct ConfigurationCache {
    options: ScanOptions,
    games: BTreeMap<Game, GameConfig>,
    config_dir: Option<PathBuf>,
}

impl ConfigurationCache {
    /// Load built-in game documents, overlay user documents from
    /// `config_dir`, and read `settings.toml` if present.
    pub fn load(config_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut games = BTreeMap::new();

        for (game, source) in builtin_game_sources() {
            let def: GameConfigDef =
                toml::from_str(source).map_err(|e| ConfigError::BuiltinParse {
                    name: game.key(),
                    source: e,
                })?;
            games.insert(game, validate_game_config(game, def)?);
        }

        if let Some(dir) = config_dir {
            for (game, config) in load_user_game_configs(dir)? {
                tracing::info!(game = game.key(), "User game document overrides built-in");
                games.insert(game, config);
            }
        }

        let options = ScanOptions::load(config_dir)?;

        tracing::debug!(games = games.len(), "Configuration loaded");

        Ok(Self {
            options,
            games,
            config_dir: config_dir.map(Path::to_path_buf),
        })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Replace the options wholesale (CLI overrides are folded in by main).
    pub fn set_options(&mut self, options: ScanOptions) {
        self.options = options;
    }

    pub fn game(&self, game: Game) -> Option<&GameConfig> {
        self.games.get(&game)
    }

    /// The configuration set for `game`, or `GameNotConfigured`: a batch
    /// cannot run against a supported game with no data documents.
    pub fn require_game(&self, game: Game) -> Result<&GameConfig, ConfigError> {
        self.games.get(&game).ok_or_else(|| ConfigError::GameNotConfigured {
            game: game.key().to_string(),
        })
    }

    /// Absolute paths of the FormID database files for `game`, in lookup
    /// order. Files that do not exist are included; the database layer
    /// skips them (database-missing is not an error).
    pub fn formid_database_paths(&self, game: Game) -> Vec<PathBuf> {
        let Some(config) = self.games.get(&game) else {
            return Vec::new();
        };
        let base = self
            .options
            .custom_paths
            .get("formid_db_dir")
            .map(PathBuf::from)
            .or_else(|| self.config_dir.clone());
        let Some(base) = base else {
            return Vec::new();
        };
        config
            .formid_databases
            .iter()
            .map(|name| base.join(name))
            .collect()
    }
}

/// Load user game documents (`<GameKey>.toml`) from the config directory.
fn load_user_game_configs(dir: &Path) -> Result<Vec<(Game, GameConfig)>, ConfigError> {
    let mut configs = Vec::new();
    for game in [
        Game::Fallout4,
        Game::Fallout4Vr,
        Game::SkyrimSe,
        Game::SkyrimVr,
    ] {
        if !game.is_supported() {
            continue;
        }
        let path = dir.join(format!("{}.toml", game.key()));
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;
        let def: GameConfigDef = toml::from_str(&text).map_err(|e| ConfigError::TomlParse {
            path: path.clone(),
            source: e,
        })?;
        configs.push((game, validate_game_config(game, def)?));
    }
    Ok(configs)
}
