use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{info, instrument};

use crate::{
    client::BridgeClient,
    configuration::{Configuration, TaskMetadata},
    error::{AtmError, Result},
    language::{LanguageQuery, Resolution},
    message::{Event, JudgeStatus, Request},
};

/// Judge language ID of C++, the only profile whose ID is known.
pub const CPP_LANGUAGE_ID: &str = "5001";

/// Contest and task a submission goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTarget {
    pub contest_id: String,
    pub task_screen_name: String,
}

/// Fill in whatever `contest`/`task` leave out, first from the task metadata and then from the
/// last two components of `cwd` (`.../abc300/abc300_a`).
pub fn guess_contest_and_task(
    contest: Option<&str>,
    task: Option<&str>,
    cwd: &Path,
    metadata: Option<&TaskMetadata>,
) -> Result<SubmitTarget> {
    let from_cwd = |path: Option<&Path>| {
        path.and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    };

    let contest_id = contest
        .map(str::to_owned)
        .or_else(|| metadata.map(|m| m.problem.contest.contest_id.clone()))
        .or_else(|| from_cwd(cwd.parent()));
    let task_screen_name = task
        .map(str::to_owned)
        .or_else(|| metadata.map(|m| m.problem.problem_id.clone()))
        .or_else(|| from_cwd(Some(cwd)));

    match (contest_id, task_screen_name) {
        (Some(contest_id), Some(task_screen_name)) => Ok(SubmitTarget {
            contest_id,
            task_screen_name,
        }),
        _ => Err(AtmError::Configuration(format!(
            "could not guess contest and task from '{}', use --contest and --task",
            cwd.display()
        ))),
    }
}

/// Submit `src` through the agent and follow the judge until it is done.
#[instrument(skip(config, cwd))]
pub fn submit_source(
    config: &Configuration,
    cwd: &Path,
    src: &Path,
    contest: Option<&str>,
    task: Option<&str>,
    lang: Option<&str>,
) -> Result<()> {
    let path: PathBuf = cwd.join(src);
    let source_code = std::fs::read_to_string(&path).map_err(|e| {
        AtmError::Configuration(format!("failed to read {} -> {e}", path.display()))
    })?;

    let metadata = TaskMetadata::load(cwd);
    let target = guess_contest_and_task(contest, task, cwd, metadata.as_ref())?;
    if contest.is_none() || task.is_none() {
        println!(
            "[CLI] Guessed Context -> Contest: {}, Task: {}",
            target.contest_id, target.task_screen_name
        );
    }

    let user_config = config.user_config();
    let resolution = LanguageQuery::new(src)
        .with_explicit(lang)
        .with_metadata(metadata.as_ref())
        .with_user_config(Some(&user_config))
        .resolve()?;
    let language_id = submit_language_id(&resolution)?;
    info!(%language_id, "language resolved");

    let request = Request::Submit {
        contest_id: target.contest_id,
        task_screen_name: target.task_screen_name,
        language_id,
        source_code,
    };
    let reply = BridgeClient::exchange(config.bridge_addr(), &request, print_progress)?;
    match reply {
        Some(event) => {
            info!(?event, "submission finished");
            Ok(())
        }
        None => Err(AtmError::Protocol(
            "native host closed the connection before the submission finished".to_owned(),
        )),
    }
}

/// Judge language ID for a resolved language.
///
/// The agent falls back to C++ on an ID it does not know, so a profile without a known ID is an
/// error instead of a silent C++ submission.
pub fn submit_language_id(resolution: &Resolution) -> Result<String> {
    match resolution {
        Resolution::ExternalId(id) => Ok(id.clone()),
        Resolution::Profile(profile) if profile.symbol == "cpp" => {
            Ok(CPP_LANGUAGE_ID.to_owned())
        }
        Resolution::Profile(profile) => Err(AtmError::Configuration(format!(
            "no judge language ID known for '{}', pass it with --lang <id>",
            profile.symbol
        ))),
    }
}

fn print_progress(event: &Event) {
    match event {
        Event::Submitted => {
            println!("\n[CLI] Code submitted successfully! Exiting to let you write the next code.");
        }
        Event::JudgeStatus(status) if status.is_done() => {
            println!(
                "\n[CLI] Judge Complete! Status: {} | Score: {} | Time: {}",
                status.status,
                status.score_text(),
                status.time_text()
            );
        }
        Event::JudgeStatus(status) if status.state == JudgeStatus::JUDGING => {
            print!("[CLI] Judging: {}\r", status.status);
            let _ = std::io::stdout().flush();
        }
        _ => {}
    }
}

#[cfg(test)]
mod submit_tests {
    use std::{io::Read, net::TcpListener, thread};

    use super::*;

    #[test]
    fn test_guess_from_cwd() {
        let target =
            guess_contest_and_task(None, None, Path::new("/home/me/abc036/abc036_a"), None)
                .unwrap();
        assert_eq!(target.contest_id, "abc036");
        assert_eq!(target.task_screen_name, "abc036_a");
    }

    #[test]
    fn test_flags_then_metadata() {
        let metadata = TaskMetadata::new("abc300", "A", "abc300_a", "cpp", "main.cpp");
        let cwd = Path::new("/home/me/abc300/A");

        let target = guess_contest_and_task(None, None, cwd, Some(&metadata)).unwrap();
        assert_eq!(target.task_screen_name, "abc300_a");

        let target = guess_contest_and_task(Some("arc100"), None, cwd, Some(&metadata)).unwrap();
        assert_eq!(target.contest_id, "arc100");
        assert_eq!(target.task_screen_name, "abc300_a");
    }

    #[test]
    fn test_root_cannot_be_guessed() {
        let err = guess_contest_and_task(None, None, Path::new("/"), None).unwrap_err();
        assert!(matches!(err, AtmError::Configuration(_)));
    }

    #[test]
    fn test_language_id_from_resolution() {
        let resolve = |src: &str, lang: Option<&str>| {
            LanguageQuery::new(Path::new(src))
                .with_explicit(lang)
                .resolve()
                .and_then(|resolution| submit_language_id(&resolution))
        };

        assert_eq!(resolve("main.cpp", None).unwrap(), CPP_LANGUAGE_ID);
        assert_eq!(resolve("main.py", Some("5055")).unwrap(), "5055");
        assert!(matches!(
            resolve("main.py", None),
            Err(AtmError::Configuration(_))
        ));
        assert!(matches!(
            resolve("main.cpp", Some("python")),
            Err(AtmError::Configuration(_))
        ));
        assert!(matches!(
            resolve("main.txt", None),
            Err(AtmError::Configuration(_))
        ));
    }

    #[test]
    fn test_symbol_is_not_sent_as_id() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("main.py"), "print(1)\n").unwrap();
        let err = submit_source(
            &Configuration::new(),
            tmp.path(),
            Path::new("main.py"),
            Some("abc300"),
            Some("abc300_a"),
            Some("python"),
        )
        .unwrap_err();
        match err {
            AtmError::Configuration(message) => assert!(message.contains("--lang"), "{message}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_source() {
        let tmp = tempfile::tempdir().unwrap();
        let err = submit_source(
            &Configuration::new(),
            tmp.path(),
            Path::new("main.cpp"),
            Some("abc300"),
            Some("abc300_a"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AtmError::Configuration(_)));
    }

    #[test]
    fn test_submit_until_done() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            stream
                .write_all(b"{\"action\":\"judge_status\",\"data\":{\"state\":\"JUDGING\",\"status\":\"1/3\"}}\n")
                .unwrap();
            stream
                .write_all(b"{\"action\":\"judge_status\",\"data\":{\"state\":\"DONE\",\"status\":\"AC\",\"score\":100}}\n")
                .unwrap();
            serde_json::from_slice::<serde_json::Value>(&buf[..n]).unwrap()
        });

        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("main.cpp"), "int main() {}\n").unwrap();
        let config = Configuration::new().with_bridge_addr(addr);
        submit_source(
            &config,
            tmp.path(),
            Path::new("main.cpp"),
            Some("abc300"),
            Some("abc300_a"),
            None,
        )
        .unwrap();

        let request = server.join().unwrap();
        assert_eq!(request["action"], "submit");
        assert_eq!(request["language_id"], CPP_LANGUAGE_ID);
        assert_eq!(request["source_code"], "int main() {}\n");
    }
}
