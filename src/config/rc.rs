use crate::controller::caret::{DEFAULT_BLINK_INTERVAL, DEFAULT_BLINK_RESUME};
use crate::document_model::analysis::{DEFAULT_OVERUSE_THRESHOLD, DEFAULT_REPETITION_DISTANCE};
use crate::document_model::{FrequencyOptions, Language, MergeRules, OrphanPolicy};
use crate::document_model::undo::{DEFAULT_MERGE_WINDOW, DEFAULT_TYPING_RUN_LIMIT, DEFAULT_UNDO_LIMIT};
use crate::error::Result;
use crate::view::center_lock::{DEFAULT_FOCUS, DEFAULT_SCROLL_DURATION};
use crate::view::continuous::{MAX_ZOOM, MIN_ZOOM};
use crate::view::paginated::{DEFAULT_ORPHANS, DEFAULT_WIDOWS};
use crate::view::{FontMetrics, Margins, PageSetup, PageSize, ViewMode};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RC_FILE_NAME: &str = ".quirerc";

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub undo_levels: usize,
    pub merge_window: Duration,
    pub typing_run: usize,
    pub view_mode: ViewMode,
    pub page_size: PageSize,
    /// Page margins in millimetres.
    pub margin: f32,
    pub mirror_margins: bool,
    pub header: f32,
    pub footer: f32,
    pub zoom: f32,
    pub font_size: f32,
    /// Line height as a multiple of the font size.
    pub line_spacing: f32,
    pub focus_position: f32,
    pub scroll_duration: Duration,
    pub smooth_scroll: bool,
    pub blink_interval: Duration,
    pub blink_resume: Duration,
    pub orphan_policy: OrphanPolicy,
    pub widows: usize,
    pub orphans: usize,
    /// Run word frequency and tag detection in the background when idle.
    pub analysis: bool,
    /// Percent of counted words at which a word is flagged as overused.
    pub overuse: f64,
    pub repetition_distance: usize,
    pub stop_words: bool,
    pub language: Language,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let page = PageSetup::default();
        Self {
            undo_levels: DEFAULT_UNDO_LIMIT,
            merge_window: DEFAULT_MERGE_WINDOW,
            typing_run: DEFAULT_TYPING_RUN_LIMIT,
            view_mode: ViewMode::Continuous,
            page_size: page.size,
            margin: page.margins.top,
            mirror_margins: page.mirror,
            header: page.header_height,
            footer: page.footer_height,
            zoom: 1.0,
            font_size: 16.0,
            line_spacing: 1.0,
            focus_position: DEFAULT_FOCUS,
            scroll_duration: DEFAULT_SCROLL_DURATION,
            smooth_scroll: true,
            blink_interval: DEFAULT_BLINK_INTERVAL,
            blink_resume: DEFAULT_BLINK_RESUME,
            orphan_policy: OrphanPolicy::default(),
            widows: DEFAULT_WIDOWS,
            orphans: DEFAULT_ORPHANS,
            analysis: true,
            overuse: DEFAULT_OVERUSE_THRESHOLD,
            repetition_distance: DEFAULT_REPETITION_DISTANCE,
            stop_words: true,
            language: Language::default(),
        }
    }
}

impl EditorConfig {
    pub fn merge_rules(&self) -> MergeRules {
        MergeRules {
            window: self.merge_window,
            max_len: self.typing_run,
        }
    }

    pub fn frequency_options(&self) -> FrequencyOptions {
        FrequencyOptions {
            overuse_threshold: self.overuse,
            repetition_distance: self.repetition_distance,
            filter_stop_words: self.stop_words,
            language: self.language,
        }
    }

    pub fn metrics(&self) -> FontMetrics {
        FontMetrics::new(self.font_size, self.line_spacing)
    }

    pub fn page_setup(&self) -> PageSetup {
        PageSetup {
            size: self.page_size,
            margins: Margins::uniform(self.margin),
            mirror: self.mirror_margins,
            header_height: self.header,
            footer_height: self.footer,
            ..PageSetup::default()
        }
    }
}

pub struct RcLoader;

impl RcLoader {
    /// Looks for .quirerc in the current directory, then in `$HOME`.
    pub fn get_rc_path() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        let home = env::var_os("HOME").map(PathBuf::from);
        Self::find_rc(&cwd, home.as_deref())
    }

    fn find_rc(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
        let local = cwd.join(RC_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }
        let home_rc = home?.join(RC_FILE_NAME);
        home_rc.is_file().then_some(home_rc)
    }

    /// Defaults overlaid with the rc file, if there is a readable one.
    pub fn load_config() -> EditorConfig {
        let Some(path) = Self::get_rc_path() else {
            return EditorConfig::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "could not read rc file, using defaults");
                EditorConfig::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<EditorConfig> {
        let content = fs::read_to_string(path)?;
        let mut config = EditorConfig::default();
        Self::parse_config_content(&content, &mut config);
        tracing::debug!(path = %path.display(), "rc file loaded");
        Ok(config)
    }

    pub fn parse_config_content(content: &str, config: &mut EditorConfig) {
        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') || line.starts_with('"') {
                continue;
            }

            Self::parse_config_line(line, config);
        }
    }

    fn parse_config_line(line: &str, config: &mut EditorConfig) {
        // Remove inline comments
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();

        let setting = line.strip_prefix("set ").map(str::trim).unwrap_or(line);
        let (key, value) = match setting.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim().to_string()),
            // Bare `set flag` / `set noflag`
            None => match setting.strip_prefix("no") {
                Some(flag) if Self::is_flag(flag) => (flag, "false".to_string()),
                _ => (setting, "true".to_string()),
            },
        };
        if !Self::apply(key, &value, config) {
            tracing::warn!(key, value = %value, "ignoring rc setting");
        }
    }

    fn is_flag(key: &str) -> bool {
        matches!(key, "mirrormargins" | "smoothscroll" | "analysis" | "stopwords")
    }

    /// Returns false for unknown keys and invalid values.
    fn apply(key: &str, value: &str, config: &mut EditorConfig) -> bool {
        match key {
            "undolevels" => set_if(&mut config.undo_levels, value.parse().ok().filter(|n| *n > 0)),
            "mergewindow" => set_if(&mut config.merge_window, parse_millis(value)),
            "typingrun" => set_if(&mut config.typing_run, value.parse().ok().filter(|n| *n > 0)),
            "viewmode" => set_if(&mut config.view_mode, ViewMode::from_id(value)),
            "pagesize" => set_if(&mut config.page_size, PageSize::from_id(value)),
            "margin" => set_if(&mut config.margin, parse_f32(value).filter(|mm| *mm >= 0.0)),
            "mirrormargins" => set_if(&mut config.mirror_margins, parse_bool(value)),
            "header" => set_if(&mut config.header, parse_f32(value).filter(|mm| *mm >= 0.0)),
            "footer" => set_if(&mut config.footer, parse_f32(value).filter(|mm| *mm >= 0.0)),
            "zoom" => set_if(
                &mut config.zoom,
                parse_f32(value).filter(|z| (MIN_ZOOM..=MAX_ZOOM).contains(z)),
            ),
            "fontsize" => set_if(&mut config.font_size, parse_f32(value).filter(|px| *px >= 4.0)),
            "lineheight" => set_if(&mut config.line_spacing, parse_f32(value).filter(|s| *s > 0.0)),
            "focusposition" => set_if(
                &mut config.focus_position,
                parse_f32(value).filter(|f| (0.0..=1.0).contains(f)),
            ),
            "scrollduration" => set_if(&mut config.scroll_duration, parse_millis(value)),
            "smoothscroll" => set_if(&mut config.smooth_scroll, parse_bool(value)),
            "blinkinterval" => set_if(
                &mut config.blink_interval,
                parse_millis(value).filter(|d| !d.is_zero()),
            ),
            "blinkresume" => set_if(&mut config.blink_resume, parse_millis(value)),
            "orphanpolicy" => set_if(&mut config.orphan_policy, OrphanPolicy::from_name(value)),
            "widows" => set_if(&mut config.widows, value.parse().ok()),
            "orphans" => set_if(&mut config.orphans, value.parse().ok()),
            "analysis" => set_if(&mut config.analysis, parse_bool(value)),
            "overuse" => set_if(
                &mut config.overuse,
                value.parse::<f64>().ok().filter(|p| p.is_finite() && *p > 0.0),
            ),
            "repetitiondistance" => set_if(&mut config.repetition_distance, value.parse().ok()),
            "stopwords" => set_if(&mut config.stop_words, parse_bool(value)),
            "language" => set_if(&mut config.language, Language::from_id(value)),
            _ => false,
        }
    }

    /// Generate a sample RC file content
    pub fn generate_sample_rc() -> String {
        r#"# quire configuration file (.quirerc)
# Lines starting with # or " are comments

# History
set undolevels=100       # undo steps kept
set mergewindow=1000     # ms between keystrokes that still merge
set typingrun=256        # longest merged typing run

# Presentation
set viewmode=continuous  # continuous, page, typewriter or manuscript
set fontsize=16
set lineheight=1.0
set zoom=1.0
set focusposition=0.4    # typewriter caret height, 0 to 1
set scrollduration=150
set smoothscroll

# Pages
set pagesize=a4          # a4, a5, letter or legal
set margin=25            # mm
set nomirrormargins
set header=10
set footer=10
set widows=2
set orphans=2

# Caret
set blinkinterval=500
set blinkresume=600

# Annotations whose text is deleted: retarget, delete, keep or ask
orphanpolicy=retarget

# Writer analysis
set analysis
set overuse=1.5          # percent of words
set repetitiondistance=50
set stopwords
set language=en          # stop words: en or pl
"#
        .to_string()
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_f32(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_millis(value: &str) -> Option<Duration> {
    value.parse::<u64>().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_vim_style_config() {
        let mut config = EditorConfig::default();
        let content = r#"
            set undolevels=50
            set viewmode=typewriter
            set mirrormargins
            set nosmoothscroll
            set pagesize=letter
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config.undo_levels, 50);
        assert_eq!(config.view_mode, ViewMode::Typewriter);
        assert!(config.mirror_margins);
        assert!(!config.smooth_scroll);
        assert_eq!(config.page_size, PageSize::Letter);
    }

    #[test]
    fn test_parse_key_value_config() {
        let mut config = EditorConfig::default();
        let content = r#"
            mergewindow=250
            typingrun=32
            zoom=1.5
            focusposition=0.5
            orphanpolicy=ask
            widows=3
            smoothscroll=no
            overuse=2.5
            repetitiondistance=20
            language=pl
            set nostopwords
            set noanalysis
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config.merge_rules(), MergeRules { window: Duration::from_millis(250), max_len: 32 });
        assert_eq!(config.zoom, 1.5);
        assert_eq!(config.focus_position, 0.5);
        assert_eq!(config.orphan_policy, OrphanPolicy::Ask);
        assert_eq!(config.widows, 3);
        assert!(!config.smooth_scroll);
        assert!(!config.analysis);
        let options = config.frequency_options();
        assert_eq!((options.overuse_threshold, options.repetition_distance), (2.5, 20));
        assert_eq!(options.language, Language::Polish);
        assert!(!options.filter_stop_words);
    }

    #[test]
    fn test_parse_mixed_config_with_comments() {
        let mut config = EditorConfig::default();
        let content = r#"
            # This is a comment
            set margin=20          # narrower pages
            " This is also a comment

            fontsize=18            # Larger type
            # set viewmode=page    # This is commented out
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config.margin, 20.0);
        assert_eq!(config.font_size, 18.0);
        assert_eq!(config.view_mode, ViewMode::Continuous);
        assert_eq!(config.page_setup().margins, Margins::uniform(20.0));
    }

    #[test]
    fn test_invalid_values_ignored() {
        let mut config = EditorConfig::default();
        let content = r#"
            set undolevels=0       # Invalid: too small
            zoom=40                # Invalid: out of range
            focusposition=1.5      # Invalid: past the bottom
            viewmode=sideways      # Invalid: unknown mode
            blinkinterval=0        # Invalid: never blinks
            unknown_setting=value  # Unknown setting
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_sample_rc_parses_to_defaults() {
        let mut config = EditorConfig::default();
        RcLoader::parse_config_content(&RcLoader::generate_sample_rc(), &mut config);
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RC_FILE_NAME);
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "set viewmode=manuscript").unwrap();
        writeln!(file, "blinkresume=900").unwrap();

        let config = RcLoader::load_from(&path).unwrap();
        assert_eq!(config.view_mode, ViewMode::Manuscript);
        assert_eq!(config.blink_resume, Duration::from_millis(900));
        assert!(RcLoader::load_from(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_current_directory_wins_over_home() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        assert_eq!(RcLoader::find_rc(cwd.path(), Some(home.path())), None);

        fs::write(home.path().join(RC_FILE_NAME), "zoom=2").unwrap();
        assert_eq!(
            RcLoader::find_rc(cwd.path(), Some(home.path())),
            Some(home.path().join(RC_FILE_NAME))
        );

        fs::write(cwd.path().join(RC_FILE_NAME), "zoom=3").unwrap();
        assert_eq!(
            RcLoader::find_rc(cwd.path(), Some(home.path())),
            Some(cwd.path().join(RC_FILE_NAME))
        );
    }
}
