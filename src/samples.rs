//! Sample test cases, on disk.
//!
//! A task directory holds an `in/` and an `out/` directory. `in/in_1.txt` is paired with
//! `out/out_1.txt`: the expected output of an input file is found by replacing every `in` of its
//! name with `out`. This rule is kept exactly as the files written by `gen` (and older tools)
//! expect it, even though a name such as `win_1.txt` pairs with `wout_1.txt`.
//!
//! When a task has no such directories, the samples of the page currently opened in the browser
//! can be fetched through a [`SampleSource`] and written to a private temporary directory, which
//! is deleted when the [`SampleStore`] is dropped.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::{info, instrument};

use crate::{
    error::{AtmError, Result},
    message::SamplePair,
};

pub const IN_DIR: &str = "in";
pub const OUT_DIR: &str = "out";
const TEMP_PREFIX: &str = "atm_cache_";

/// Somewhere samples can be fetched from when none exist locally.
pub trait SampleSource {
    fn fetch_samples(&self) -> Result<Vec<SamplePair>>;
}

/// Name of the expected-output file paired with `input_name`.
pub fn expected_name(input_name: &str) -> String {
    input_name.replace("in", "out")
}

/// One input file and, if it exists, its expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleCase {
    /// File name of the input, e.g. `in_1.txt`.
    pub name: String,
    pub input: PathBuf,
    pub expected: Option<PathBuf>,
}

/// Write `samples` as `in/in_<i>.txt` / `out/out_<i>.txt` under `dir`, starting at 1.
pub fn write_samples(dir: &Path, samples: &[SamplePair]) -> Result<()> {
    let in_dir = dir.join(IN_DIR);
    let out_dir = dir.join(OUT_DIR);
    for d in [&in_dir, &out_dir] {
        fs::create_dir_all(d)
            .map_err(|e| AtmError::io(format!("could not create {}", d.display()), e))?;
    }

    for (i, sample) in samples.iter().enumerate() {
        let idx = i + 1;
        let files = [
            (in_dir.join(format!("in_{idx}.txt")), &sample.input),
            (out_dir.join(format!("out_{idx}.txt")), &sample.output),
        ];
        for (path, content) in files {
            fs::write(&path, content)
                .map_err(|e| AtmError::io(format!("could not write {}", path.display()), e))?;
        }
    }
    Ok(())
}

/// An `in/` + `out/` directory pair, possibly living in a temporary directory.
#[derive(Debug)]
pub struct SampleStore {
    in_dir: PathBuf,
    out_dir: PathBuf,
    // removed on drop
    scratch: Option<TempDir>,
}

impl SampleStore {
    /// Samples of `task_dir`, or `None` if it lacks `in/` or `out/`.
    pub fn open(task_dir: &Path) -> Option<SampleStore> {
        let in_dir = task_dir.join(IN_DIR);
        let out_dir = task_dir.join(OUT_DIR);
        (in_dir.is_dir() && out_dir.is_dir()).then_some(SampleStore {
            in_dir,
            out_dir,
            scratch: None,
        })
    }

    /// Write `samples` into a fresh temporary directory under the system temp dir.
    pub fn materialize(samples: &[SamplePair]) -> Result<SampleStore> {
        Self::materialize_in(&std::env::temp_dir(), samples)
    }

    /// Write `samples` into a fresh temporary directory under `parent`.
    ///
    /// An empty sample list is an error and leaves nothing behind.
    #[instrument(skip(samples), fields(count = samples.len()))]
    pub fn materialize_in(parent: &Path, samples: &[SamplePair]) -> Result<SampleStore> {
        if samples.is_empty() {
            return Err(AtmError::Configuration(
                "could not find samples in the active tab".to_owned(),
            ));
        }
        let scratch = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| AtmError::io("could not create temporary sample directory", e))?;
        // on error `scratch` is dropped, and the directory with it
        write_samples(scratch.path(), samples)?;
        info!(dir = %scratch.path().display(), "samples materialized");

        Ok(SampleStore {
            in_dir: scratch.path().join(IN_DIR),
            out_dir: scratch.path().join(OUT_DIR),
            scratch: Some(scratch),
        })
    }

    /// Local samples of `task_dir`, falling back to `source` when there are none.
    pub fn locate(task_dir: &Path, source: &dyn SampleSource) -> Result<SampleStore> {
        if let Some(store) = Self::open(task_dir) {
            return Ok(store);
        }
        println!("[CLI] Current directory doesn't have 'in/' or 'out/' folders.");
        println!("[CLI] Fetching samples from the active browser tab...");
        let samples = source.fetch_samples()?;
        let store = Self::materialize(&samples)?;
        println!(
            "[CLI] Extracted {} samples into a temporary directory.",
            samples.len()
        );
        Ok(store)
    }

    /// Whether the samples live in a temporary directory.
    pub fn is_temporary(&self) -> bool {
        self.scratch.is_some()
    }

    pub fn in_dir(&self) -> &Path {
        &self.in_dir
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Every `*.txt` file of `in/`, in lexicographic order, with its expected output.
    pub fn cases(&self) -> Result<Vec<SampleCase>> {
        let entries = fs::read_dir(&self.in_dir)
            .map_err(|e| AtmError::io(format!("could not read {}", self.in_dir.display()), e))?;

        let mut names = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".txt"))
            .collect::<Vec<_>>();
        names.sort();

        Ok(names
            .into_iter()
            .map(|name| {
                let expected = self.out_dir.join(expected_name(&name));
                SampleCase {
                    input: self.in_dir.join(&name),
                    expected: expected.is_file().then_some(expected),
                    name,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod samples_tests {
    use super::*;

    fn pair(input: &str, output: &str) -> SamplePair {
        SamplePair {
            input: input.to_owned(),
            output: output.to_owned(),
        }
    }

    #[test]
    fn test_expected_name() {
        assert_eq!(expected_name("in_1.txt"), "out_1.txt");
        assert_eq!(expected_name("sample_input_1.txt"), "sample_output_1.txt");
        // known sharp edge: every "in" is replaced
        assert_eq!(expected_name("win_1.txt"), "wout_1.txt");
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        write_samples(dir.path(), &[pair("1\n", "2\n"), pair("3\n", "4\n")]).unwrap();

        let store = SampleStore::open(dir.path()).unwrap();
        assert!(!store.is_temporary());
        let cases = store.cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "in_1.txt");
        assert_eq!(
            fs::read_to_string(cases[1].expected.as_ref().unwrap()).unwrap(),
            "4\n"
        );
    }

    #[test]
    fn test_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(IN_DIR)).unwrap();
        assert!(SampleStore::open(dir.path()).is_none());
    }

    #[test]
    fn test_cases_order_and_missing_pair() {
        let dir = tempfile::tempdir().unwrap();
        write_samples(dir.path(), &[pair("a", "a")]).unwrap();
        fs::write(dir.path().join("in/in_10.txt"), "x").unwrap();
        fs::write(dir.path().join("in/in_2.txt"), "y").unwrap();
        fs::write(dir.path().join("out/out_2.txt"), "y").unwrap();
        fs::write(dir.path().join("in/notes.md"), "ignored").unwrap();

        let cases = SampleStore::open(dir.path()).unwrap().cases().unwrap();
        let names = cases.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        // lexicographic, not numeric
        assert_eq!(names, ["in_1.txt", "in_10.txt", "in_2.txt"]);
        assert!(cases[1].expected.is_none());
        assert!(cases[2].expected.is_some());
    }

    #[test]
    fn test_temporary_store_is_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let store = SampleStore::materialize_in(parent.path(), &[pair("1 2\n", "3\n")]).unwrap();
        assert!(store.is_temporary());
        assert!(store.in_dir().starts_with(parent.path()));
        assert_eq!(store.cases().unwrap().len(), 1);

        drop(store);
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_fallback_leaves_nothing() {
        let parent = tempfile::tempdir().unwrap();
        let err = SampleStore::materialize_in(parent.path(), &[]).unwrap_err();
        assert!(matches!(err, AtmError::Configuration(_)));
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_locate_prefers_local_samples() {
        struct Unreachable;
        impl SampleSource for Unreachable {
            fn fetch_samples(&self) -> Result<Vec<SamplePair>> {
                panic!("local samples exist, source must not be used");
            }
        }

        let dir = tempfile::tempdir().unwrap();
        write_samples(dir.path(), &[pair("1", "1")]).unwrap();
        let store = SampleStore::locate(dir.path(), &Unreachable).unwrap();
        assert!(!store.is_temporary());
    }
}
