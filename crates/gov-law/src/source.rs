//! # Law Sources and the Law Book
//!
//! A [`LawSource`] supplies raw rule-language text by law identifier. A
//! [`LawBook`] compiles a list of identifiers from a source at setup time,
//! failing fast on the first problem, and answers "which laws govern this
//! span?" at run time.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use gov_core::{GovernableSpan, LawDefinition, PolicyLayer};

use crate::error::{LawBookError, LawSourceError};
use crate::parser::{parse_law_with, ParserOptions};

/// File extension of law files in a [`DirectoryLawSource`].
pub const LAW_FILE_EXTENSION: &str = "law";

/// Supplies raw law text by identifier (`name:version`).
pub trait LawSource {
    /// Load the text for `id`.
    fn load(&self, id: &str) -> Result<String, LawSourceError>;
}

/// Laws held in memory, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLawSource {
    texts: BTreeMap<String, String>,
}

impl InMemoryLawSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add law text under `id`.
    pub fn with_law(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    /// Add or replace law text under `id`.
    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(id.into(), text.into());
    }
}

impl LawSource for InMemoryLawSource {
    fn load(&self, id: &str) -> Result<String, LawSourceError> {
        self.texts
            .get(id)
            .cloned()
            .ok_or_else(|| LawSourceError::NotFound(id.to_string()))
    }
}

/// Laws stored as `<dir>/<name>.law`, one version per name.
#[derive(Debug, Clone)]
pub struct DirectoryLawSource {
    dir: PathBuf,
}

impl DirectoryLawSource {
    /// Source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of every law file in the directory, sorted by file name.
    pub fn law_files(&self) -> Result<Vec<PathBuf>, LawSourceError> {
        let io_err = |source: std::io::Error| LawSourceError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension() == Some(OsStr::new(LAW_FILE_EXTENSION)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, LawSourceError> {
        let name = id.split(':').next().unwrap_or_default();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(LawSourceError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{LAW_FILE_EXTENSION}")))
    }
}

impl LawSource for DirectoryLawSource {
    fn load(&self, id: &str) -> Result<String, LawSourceError> {
        let path = self.path_for(id)?;
        std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LawSourceError::NotFound(id.to_string())
            } else {
                LawSourceError::Io { path, source }
            }
        })
    }
}

/// A compiled law and the policy layer it speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredLaw {
    /// The compiled law.
    pub definition: LawDefinition,
    /// Layer the law's actions are proposed at.
    pub layer: PolicyLayer,
}

/// The set of laws in force for a tenant, in registration order.
#[derive(Debug, Clone, Default)]
pub struct LawBook {
    laws: Vec<RegisteredLaw>,
}

impl LawBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and compile `ids` from `source` at the default layer.
    ///
    /// Stops at the first missing, unreadable, malformed, mismatched or
    /// duplicate law.
    pub fn load<S: LawSource + ?Sized>(
        source: &S,
        ids: &[impl AsRef<str>],
        options: &ParserOptions,
    ) -> Result<Self, LawBookError> {
        let mut book = Self::new();
        for id in ids {
            let id = id.as_ref();
            let text = source.load(id)?;
            let definition = parse_law_with(&text, options).map_err(|error| LawBookError::Parse {
                id: id.to_string(),
                error,
            })?;
            if definition.id != id {
                return Err(LawBookError::IdMismatch {
                    requested: id.to_string(),
                    declared: definition.id,
                });
            }
            book.register(definition, PolicyLayer::default())?;
        }
        tracing::info!(laws = book.len(), "law book loaded");
        Ok(book)
    }

    /// Compile every law file in `source`'s directory, in file-name order.
    pub fn load_directory(
        source: &DirectoryLawSource,
        options: &ParserOptions,
    ) -> Result<Self, LawBookError> {
        let mut book = Self::new();
        for path in source.law_files()? {
            let text = std::fs::read_to_string(&path).map_err(|e| LawSourceError::Io {
                path: path.clone(),
                source: e,
            })?;
            let definition = parse_law_with(&text, options).map_err(|error| LawBookError::Parse {
                id: path.display().to_string(),
                error,
            })?;
            book.register(definition, PolicyLayer::default())?;
        }
        tracing::info!(dir = %source.dir().display(), laws = book.len(), "law book loaded");
        Ok(book)
    }

    /// Add a compiled law speaking for `layer`.
    pub fn register(&mut self, definition: LawDefinition, layer: PolicyLayer) -> Result<(), LawBookError> {
        if self.get(&definition.id).is_some() {
            return Err(LawBookError::Duplicate(definition.id));
        }
        self.laws.push(RegisteredLaw { definition, layer });
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_law(mut self, definition: LawDefinition, layer: PolicyLayer) -> Result<Self, LawBookError> {
        self.register(definition, layer)?;
        Ok(self)
    }

    /// Look a law up by identifier.
    pub fn get(&self, id: &str) -> Option<&RegisteredLaw> {
        self.laws.iter().find(|law| law.definition.id == id)
    }

    /// All laws, in registration order.
    pub fn laws(&self) -> &[RegisteredLaw] {
        &self.laws
    }

    /// Number of laws.
    pub fn len(&self) -> usize {
        self.laws.len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.laws.is_empty()
    }

    /// Candidate laws for `span`, in evaluation order.
    ///
    /// Explicit `law.targets` take precedence and keep their order; targets
    /// not in the book are skipped with a warning. Without targets, every
    /// law whose scope matches the resource type is a candidate.
    pub fn candidates(&self, span: &GovernableSpan) -> Vec<&RegisteredLaw> {
        match span.law.as_ref().filter(|binding| !binding.targets.is_empty()) {
            Some(binding) => binding
                .targets
                .iter()
                .filter_map(|target| {
                    let found = self.get(target);
                    if found.is_none() {
                        tracing::warn!(span = %span.id, law = %target, "targeted law not in law book");
                    }
                    found
                })
                .collect(),
            None => self
                .laws
                .iter()
                .filter(|law| law.definition.applies_to(&span.resource.kind))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_core::{Resource, Who};

    fn law_text(name: &str, scope: &str) -> String {
        format!(
            "law {name}:1.0.0:\n\
             scope: {scope}\n\
             clock: midnight UTC\n\
             if ok: accepted == true\n\
             then: accept\n\
             if doubt: accepted == null\n\
             then: hold(hours=24)\n\
             if not: accepted == false\n\
             then: terminate(reason=rejected)\n"
        )
    }

    fn span(kind: &str) -> GovernableSpan {
        GovernableSpan::builder("t", "app")
            .resource(Resource::new(kind, "r-1"))
            .who(Who::new("u", "r"))
            .build()
    }

    fn book() -> LawBook {
        let source = InMemoryLawSource::new()
            .with_law("deadline:1.0.0", law_text("deadline", "deliverable"))
            .with_law("any:1.0.0", law_text("any", "*"))
            .with_law("invoice:1.0.0", law_text("invoice", "invoice"));
        LawBook::load(
            &source,
            &["deadline:1.0.0", "any:1.0.0", "invoice:1.0.0"],
            &ParserOptions::default(),
        )
        .unwrap()
    }

    fn ids(laws: Vec<&RegisteredLaw>) -> Vec<&str> {
        laws.into_iter().map(|l| l.definition.id.as_str()).collect()
    }

    #[test]
    fn scope_selects_candidates_in_registration_order() {
        let book = book();
        assert_eq!(ids(book.candidates(&span("deliverable"))), vec!["deadline:1.0.0", "any:1.0.0"]);
        assert_eq!(ids(book.candidates(&span("task"))), vec!["any:1.0.0"]);
        assert!(book.laws().iter().all(|l| l.layer == PolicyLayer::AppRegulatory));
    }

    #[test]
    fn explicit_targets_override_scope_and_keep_order() {
        let book = book();
        let mut bound = span("deliverable");
        bound.law = Some(gov_core::LawBinding {
            scope: "deliverable".into(),
            targets: vec!["invoice:1.0.0".into(), "missing:9.9.9".into(), "deadline:1.0.0".into()],
        });
        assert_eq!(ids(book.candidates(&bound)), vec!["invoice:1.0.0", "deadline:1.0.0"]);
    }

    #[test]
    fn load_fails_fast() {
        let source = InMemoryLawSource::new()
            .with_law("good:1.0.0", law_text("good", "*"))
            .with_law("bad:1.0.0", "law bad:1.0.0:\nscope: *\n");
        let err = LawBook::load(&source, &["good:1.0.0", "bad:1.0.0"], &ParserOptions::default())
            .unwrap_err();
        assert!(matches!(err, LawBookError::Parse { ref id, .. } if id == "bad:1.0.0"));

        let err = LawBook::load(&source, &["nope:1.0.0"], &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, LawBookError::Source(LawSourceError::NotFound(_))));
    }

    #[test]
    fn declared_id_must_match_request() {
        let source = InMemoryLawSource::new().with_law("good:2.0.0", law_text("good", "*"));
        let err = LawBook::load(&source, &["good:2.0.0"], &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, LawBookError::IdMismatch { ref declared, .. } if declared == "good:1.0.0"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut book = book();
        let again = book.laws()[0].definition.clone();
        assert!(matches!(
            book.register(again, PolicyLayer::Tenant),
            Err(LawBookError::Duplicate(_))
        ));
    }

    #[test]
    fn directory_source_reads_law_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_deadline.law"), law_text("b_deadline", "deliverable")).unwrap();
        std::fs::write(dir.path().join("a_any.law"), law_text("a_any", "*")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a law").unwrap();

        let source = DirectoryLawSource::new(dir.path());
        assert!(source.load("b_deadline:1.0.0").unwrap().starts_with("law b_deadline"));
        assert!(matches!(source.load("zzz:1.0.0"), Err(LawSourceError::NotFound(_))));
        assert!(matches!(source.load("../etc:1.0.0"), Err(LawSourceError::InvalidId(_))));

        let book = LawBook::load_directory(&source, &ParserOptions::default()).unwrap();
        let ids: Vec<&str> = book.laws().iter().map(|l| l.definition.id.as_str()).collect();
        assert_eq!(ids, vec!["a_any:1.0.0", "b_deadline:1.0.0"]);

        let by_id = LawBook::load(&source, &["b_deadline:1.0.0"], &ParserOptions::default()).unwrap();
        assert_eq!(by_id.len(), 1);
    }
}
