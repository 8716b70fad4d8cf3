//! Language profiles and the resolution of which one applies to a source file.
//!
//! A profile is a compile template (optional) and a run template. Templates may contain the
//! placeholders `{src}` (source path), `{exec}` (executable name) and `{basename}` (source file
//! name without extension).
//!
//! Resolution tries, in order: the explicit `--lang` value, the source extension, the task's
//! `metadata.json`, and the user config. The first source that names a known profile wins.

use std::path::Path;

use crate::{
    configuration::{TaskMetadata, UserConfig},
    error::{AtmError, Result},
};

/// Compile/run templates of one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub symbol: &'static str,
    /// Lower-case, with the leading dot. Never empty.
    pub extensions: &'static [&'static str],
    pub compile: Option<&'static [&'static str]>,
    /// Never empty.
    pub run: &'static [&'static str],
}

macro_rules! profile {
    ($symbol:literal, [$($ext:literal),+], None, [$($run:literal),+]) => {
        LanguageProfile {
            symbol: $symbol,
            extensions: &[$($ext),+],
            compile: None,
            run: &[$($run),+],
        }
    };
    ($symbol:literal, [$($ext:literal),+], [$($cc:literal),+], [$($run:literal),+]) => {
        LanguageProfile {
            symbol: $symbol,
            extensions: &[$($ext),+],
            compile: Some(&[$($cc),+]),
            run: &[$($run),+],
        }
    };
}

/// Every known language. When two profiles share an extension, the first one wins.
pub static LANGUAGES: &[LanguageProfile] = &[
    profile!("cpp", [".cpp", ".cc", ".cxx"],
        ["g++", "-std=gnu++20", "-Wall", "-Wextra", "-O2", "{src}", "-o", "{exec}"],
        ["./{exec}"]),
    profile!("python", [".py"], None, ["python3", "{src}"]),
    profile!("pypy", [".py"], None, ["pypy3", "{src}"]),
    profile!("rust", [".rs"], ["rustc", "-O", "{src}", "-o", "{exec}"], ["./{exec}"]),
    profile!("java", [".java"], ["javac", "{src}"], ["java", "{basename}"]),
    profile!("go", [".go"], ["go", "build", "-o", "{exec}", "{src}"], ["./{exec}"]),
    profile!("c", [".c"],
        ["gcc", "-std=gnu11", "-Wall", "-Wextra", "-O2", "{src}", "-o", "{exec}"],
        ["./{exec}"]),
    profile!("csharp", [".cs"],
        ["csc", "-nologo", "-out:{exec}.exe", "{src}"],
        ["./{exec}.exe"]),
    profile!("ruby", [".rb"], None, ["ruby", "{src}"]),
    profile!("js", [".js"], None, ["node", "{src}"]),
    profile!("ts", [".ts"], ["tsc", "{src}"], ["node", "{exec}.js"]),
];

/// Look a profile up by symbol (case-insensitive).
pub fn by_symbol(symbol: &str) -> Option<&'static LanguageProfile> {
    let symbol = symbol.to_lowercase();
    LANGUAGES.iter().find(|p| p.symbol == symbol)
}

/// Look a profile up by the extension of `src` (case-insensitive).
pub fn by_extension(src: &Path) -> Option<&'static LanguageProfile> {
    let ext = format!(".{}", src.extension()?.to_str()?.to_lowercase());
    LANGUAGES.iter().find(|p| p.extensions.contains(&ext.as_str()))
}

/// True for values made only of ASCII digits: the judge's own language IDs.
pub fn is_external_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Outcome of [`LanguageQuery::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Profile(&'static LanguageProfile),
    /// A numeric ID only the remote judge understands. No local templates exist for it.
    ExternalId(String),
}

/// Everything language resolution may look at.
#[derive(Debug, Clone, Copy)]
pub struct LanguageQuery<'a> {
    pub explicit: Option<&'a str>,
    pub src: &'a Path,
    pub metadata: Option<&'a TaskMetadata>,
    pub user_config: Option<&'a UserConfig>,
}

type Resolver = for<'a> fn(&LanguageQuery<'a>) -> Option<&'static LanguageProfile>;

fn from_explicit(query: &LanguageQuery<'_>) -> Option<&'static LanguageProfile> {
    query.explicit.filter(|v| !is_external_id(v)).and_then(by_symbol)
}

fn from_extension(query: &LanguageQuery<'_>) -> Option<&'static LanguageProfile> {
    by_extension(query.src)
}

fn from_metadata(query: &LanguageQuery<'_>) -> Option<&'static LanguageProfile> {
    query.metadata.and_then(|m| by_symbol(&m.lang))
}

fn from_user_config(query: &LanguageQuery<'_>) -> Option<&'static LanguageProfile> {
    query.user_config?.lang.as_deref().and_then(by_symbol)
}

/// Resolvers in priority order.
const RESOLVERS: [Resolver; 4] = [from_explicit, from_extension, from_metadata, from_user_config];

impl<'a> LanguageQuery<'a> {
    pub fn new(src: &'a Path) -> Self {
        LanguageQuery {
            explicit: None,
            src,
            metadata: None,
            user_config: None,
        }
    }

    pub fn with_explicit(mut self, explicit: Option<&'a str>) -> Self {
        self.explicit = explicit;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<&'a TaskMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_config(mut self, user_config: Option<&'a UserConfig>) -> Self {
        self.user_config = user_config;
        self
    }

    /// Resolve for submission: an explicit numeric ID is returned as is.
    pub fn resolve(&self) -> Result<Resolution> {
        if let Some(id) = self.explicit.filter(|v| is_external_id(v)) {
            return Ok(Resolution::ExternalId(id.to_owned()));
        }
        self.resolve_profile().map(Resolution::Profile)
    }

    /// Resolve for local execution: numeric IDs carry no templates, so they are skipped.
    pub fn resolve_profile(&self) -> Result<&'static LanguageProfile> {
        RESOLVERS
            .iter()
            .find_map(|resolver| resolver(self))
            .ok_or_else(|| {
                AtmError::Configuration(format!(
                    "could not determine language for local testing of '{}'",
                    self.src.display()
                ))
            })
    }
}

/// Concrete command lines for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
}

impl CommandSet {
    /// Executable name substituted for `{exec}`.
    pub const EXEC_NAME: &'static str = if cfg!(windows) { "a.exe" } else { "a.out" };

    /// Templates of `profile`, replaced by the user's overrides when present.
    pub fn templates(profile: &LanguageProfile, user_config: Option<&UserConfig>) -> CommandSet {
        let to_owned = |t: &[&str]| t.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut set = CommandSet {
            compile: profile.compile.map(to_owned),
            run: to_owned(profile.run),
        };
        if let Some(over) = user_config.and_then(|c| c.command_override(profile.symbol)) {
            if let Some(compile) = &over.compile {
                set.compile = (!compile.is_empty()).then(|| compile.clone());
            }
            if let Some(run) = over.run.as_ref().filter(|run| !run.is_empty()) {
                set.run = run.clone();
            }
        }
        set
    }

    /// Substitute the placeholders for `src`.
    pub fn for_source(&self, src: &Path) -> CommandSet {
        let src_str = src.to_string_lossy();
        let basename = src
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let fill = |template: &[String]| {
            template
                .iter()
                .map(|part| {
                    part.replace("{src}", &src_str)
                        .replace("{exec}", Self::EXEC_NAME)
                        .replace("{basename}", &basename)
                })
                .collect::<Vec<_>>()
        };
        CommandSet {
            compile: self.compile.as_deref().map(fill),
            run: fill(&self.run),
        }
    }
}
