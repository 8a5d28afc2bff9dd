use super::switch::{DEFAULT_COLOR, Switch, SwitchDef};
use super::SwitchError;
use crate::domain::Level;
use arc_swap::ArcSwap;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// How category prefixes are compared against switch patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Byte-wise, case-sensitive.
    #[default]
    Ordinal,
    IgnoreAsciiCase,
}

impl MatchMode {
    pub fn is_prefix(self, pattern: &str, category: &str) -> bool {
        match self {
            MatchMode::Ordinal => category.starts_with(pattern),
            MatchMode::IgnoreAsciiCase => {
                let (pattern, category) = (pattern.as_bytes(), category.as_bytes());
                category.len() >= pattern.len()
                    && category[..pattern.len()].eq_ignore_ascii_case(pattern)
            }
        }
    }
}

/// One published generation of the registry.
#[derive(Debug)]
pub struct SwitchTable {
    version: u64,
    switches: Vec<Arc<Switch>>,
    default_switch: Arc<Switch>,
}

impl SwitchTable {
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Switches ordered by descending pattern length, ties broken ordinally.
    pub fn switches(&self) -> &[Arc<Switch>] {
        &self.switches
    }

    pub fn default_switch(&self) -> &Arc<Switch> {
        &self.default_switch
    }

    /// The first hit in length order is the longest matching prefix.
    pub fn find(&self, category: &str, mode: MatchMode) -> &Arc<Switch> {
        self.switches
            .iter()
            .find(|switch| mode.is_prefix(switch.pattern(), category))
            .unwrap_or(&self.default_switch)
    }
}

/// Copy-on-write switch registry shared by every [`SwitchSource`].
///
/// Readers do a single atomic load and never block. Writers build the next
/// table off to the side, publish it with one store and only then bump the
/// version, so a reader that sees version `n` also sees table `n`.
pub struct SwitchRegistry {
    table: ArcSwap<SwitchTable>,
    version: AtomicU64,
    writer: Mutex<()>,
    mode: MatchMode,
}

impl SwitchRegistry {
    pub fn new(default_level: Level, mode: MatchMode) -> Self {
        Self::with_default(Switch::fallback(default_level, DEFAULT_COLOR), mode)
    }

    fn with_default(default_switch: Switch, mode: MatchMode) -> Self {
        let table = SwitchTable {
            version: 0,
            switches: Vec::new(),
            default_switch: Arc::new(default_switch),
        };

        Self {
            table: ArcSwap::from_pointee(table),
            version: AtomicU64::new(0),
            writer: Mutex::new(()),
            mode,
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn lookup(&self, category: &str) -> Result<Arc<Switch>, SwitchError> {
        if category.trim().is_empty() {
            return Err(SwitchError::BlankCategory);
        }

        let table = self.table.load();
        Ok(Arc::clone(table.find(category, self.mode)))
    }

    /// Replaces the whole registry. Either every definition converts and the
    /// version moves by exactly one, or nothing changes.
    pub fn update(&self, defs: &[SwitchDef]) -> Result<u64, SwitchError> {
        let _guard = self.writer.lock();

        let mut seen = HashSet::with_capacity(defs.len());
        let mut switches = Vec::with_capacity(defs.len());
        // Later definitions of the same pattern win.
        for def in defs.iter().rev() {
            let switch = Switch::from_def(def)?;
            if seen.insert(switch.pattern().to_string()) {
                switches.push(Arc::new(switch));
            }
        }
        switches.sort_by(|a, b| {
            (Reverse(a.pattern().len()), a.pattern()).cmp(&(Reverse(b.pattern().len()), b.pattern()))
        });

        let current = self.table.load();
        let version = current.version + 1;
        let next = SwitchTable {
            version,
            switches,
            default_switch: Arc::clone(&current.default_switch),
        };

        self.table.store(Arc::new(next));
        self.version.store(version, Ordering::Release);

        debug!(version, count = defs.len(), "Published switch registry");
        Ok(version)
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// The current generation, with its version and table always consistent.
    pub fn snapshot(&self) -> Arc<SwitchTable> {
        self.table.load_full()
    }
}

impl Default for SwitchRegistry {
    fn default() -> Self {
        Self::new(Level::default(), MatchMode::default())
    }
}

impl std::fmt::Debug for SwitchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchRegistry")
            .field("version", &self.version())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Answers "what is the effective policy for category C", and keeps that
/// answer current.
pub trait SwitchSource: Send + Sync {
    fn registry(&self) -> &SwitchRegistry;

    fn lookup(&self, category: &str) -> Result<Arc<Switch>, SwitchError> {
        self.registry().lookup(category)
    }

    fn update(&self, defs: &[SwitchDef]) -> Result<u64, SwitchError> {
        self.registry().update(defs)
    }

    fn version(&self) -> u64 {
        self.registry().version()
    }

    /// Idempotent. May launch a background refresh loop.
    fn start(&self) -> Result<(), SwitchError>;

    /// Idempotent.
    fn stop(&self);

    /// One refresh from the backing source, outside any schedule.
    fn update_async(&self) -> BoxFuture<'_, Result<u64, SwitchError>>;
}

/// A switch source fed only through [`SwitchSource::update`].
#[derive(Debug, Default)]
pub struct LocalSwitchSource {
    registry: SwitchRegistry,
    started: AtomicBool,
}

impl LocalSwitchSource {
    pub fn new(registry: SwitchRegistry) -> Self {
        Self {
            registry,
            started: AtomicBool::new(false),
        }
    }

    pub fn with_switches(
        default_level: Level,
        defs: &[SwitchDef],
    ) -> Result<Self, SwitchError> {
        let source = Self::new(SwitchRegistry::new(default_level, MatchMode::Ordinal));
        if !defs.is_empty() {
            source.registry.update(defs)?;
        }
        Ok(source)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl SwitchSource for LocalSwitchSource {
    fn registry(&self) -> &SwitchRegistry {
        &self.registry
    }

    fn start(&self) -> Result<(), SwitchError> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) {
        self.started.store(false, Ordering::Release);
    }

    fn update_async(&self) -> BoxFuture<'_, Result<u64, SwitchError>> {
        future::ready(Ok(self.registry.version())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(patterns: &[&str]) -> SwitchRegistry {
        let registry = SwitchRegistry::default();
        let defs: Vec<SwitchDef> = patterns
            .iter()
            .map(|p| SwitchDef::new(*p, Level::Debug).with_tag(*p))
            .collect();
        registry.update(&defs).unwrap();
        registry
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = registry_with(&["Fabrica", "Fabrica.Data"]);
        let switch = registry.lookup("Fabrica.Data.Sql").unwrap();
        assert_eq!(switch.pattern(), "Fabrica.Data");

        let switch = registry.lookup("Fabrica.Web").unwrap();
        assert_eq!(switch.pattern(), "Fabrica");
    }

    #[test]
    fn test_unmatched_category_gets_default() {
        let registry = registry_with(&["Fabrica"]);
        let switch = registry.lookup("Other.Thing").unwrap();
        assert_eq!(switch.pattern(), "");
        assert_eq!(switch.level(), Level::Warning);
    }

    #[test]
    fn test_blank_category_is_rejected() {
        let registry = registry_with(&["Fabrica"]);
        assert!(matches!(registry.lookup(""), Err(SwitchError::BlankCategory)));
        assert!(matches!(registry.lookup("  \t"), Err(SwitchError::BlankCategory)));
    }

    #[test]
    fn test_matching_is_case_sensitive_by_default() {
        let registry = registry_with(&["Fabrica"]);
        assert_eq!(registry.lookup("fabrica.data").unwrap().pattern(), "");
    }

    #[test]
    fn test_ignore_case_mode_matches_any_ascii_case() {
        let registry = SwitchRegistry::new(Level::Warning, MatchMode::IgnoreAsciiCase);
        registry
            .update(&[SwitchDef::new("Fabrica.Data", Level::Trace)])
            .unwrap();
        assert_eq!(
            registry.lookup("FABRICA.DATA.Sql").unwrap().pattern(),
            "Fabrica.Data"
        );
        assert_eq!(registry.lookup("Fab").unwrap().pattern(), "");
    }

    #[test]
    fn test_duplicate_pattern_last_definition_wins() {
        let registry = SwitchRegistry::default();
        registry
            .update(&[
                SwitchDef::new("Fabrica", Level::Info).with_tag("first"),
                SwitchDef::new("Fabrica", Level::Error).with_tag("second"),
            ])
            .unwrap();

        let table = registry.snapshot();
        assert_eq!(table.switches().len(), 1);
        let switch = registry.lookup("Fabrica.Web").unwrap();
        assert_eq!(switch.tag(), "second");
        assert_eq!(switch.level(), Level::Error);
    }

    #[test]
    fn test_update_bumps_version_by_one() {
        let registry = SwitchRegistry::default();
        assert_eq!(registry.version(), 0);
        assert_eq!(registry.update(&[SwitchDef::new("A", Level::Info)]).unwrap(), 1);
        assert_eq!(registry.update(&[]).unwrap(), 2);
        assert_eq!(registry.version(), 2);
        assert_eq!(registry.snapshot().version(), 2);
        assert_eq!(registry.lookup("A.b").unwrap().pattern(), "");
    }

    #[test]
    fn test_failed_update_leaves_registry_untouched() {
        let registry = registry_with(&["Fabrica"]);
        let result = registry.update(&[
            SwitchDef::new("Fabrica.Data", Level::Error),
            SwitchDef::new("", Level::Error),
        ]);

        assert!(result.is_err());
        assert_eq!(registry.version(), 1);
        assert_eq!(registry.lookup("Fabrica.Data").unwrap().pattern(), "Fabrica");
    }

    #[test]
    fn test_table_is_sorted_longest_first() {
        let registry = registry_with(&["B", "Abc", "Ab", "Abd"]);
        let table = registry.snapshot();
        let patterns: Vec<&str> = table.switches().iter().map(|s| s.pattern()).collect();
        assert_eq!(patterns, vec!["Abc", "Abd", "Ab", "B"]);
    }
}
