use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use tracing::{info, instrument, warn};

use crate::{
    client::BridgeClient,
    configuration::{Configuration, TaskMetadata, UserConfig},
    error::{AtmError, Result},
    language,
    message::{Event, GenResult, Request},
    samples::write_samples,
};

const DEFAULT_LANG: &str = "cpp";

/// Ask the agent for every task of `contest_id` and lay them out under `cwd/<contest_id>`.
///
/// Refuses to run when that directory already exists.
#[instrument(skip(config, cwd))]
pub fn gen_contest(config: &Configuration, cwd: &Path, contest_id: &str) -> Result<PathBuf> {
    let contest_dir = cwd.join(contest_id);
    if contest_dir.exists() {
        return Err(AtmError::Configuration(format!(
            "directory '{}' already exists, aborting to prevent overwriting existing files",
            contest_dir.display()
        )));
    }

    let request = Request::Gen {
        contest_id: contest_id.to_owned(),
    };
    let mut client = BridgeClient::connect(config.bridge_addr())?;
    client.send(&request)?;
    println!("[CLI] Requested generation for contest: {contest_id}");

    let reply = client.events().until(
        |event| request.is_final_reply(event),
        |event| {
            if let Event::GenLog(message) = event {
                println!("[CLI] {message}");
            }
        },
    )?;

    match reply {
        Some(Event::GenResult(result)) => {
            println!("\n[CLI] Download complete! Building workspace...");
            let dir = build_workspace(cwd, &result, &config.user_config())?;
            println!("[CLI] Successfully generated workspace at {}", dir.display());
            Ok(dir)
        }
        Some(Event::GenError(error)) => Err(AtmError::Agent(error)),
        Some(other) => Err(AtmError::Protocol(format!(
            "unexpected reply to gen request: {other:?}"
        ))),
        None => Err(AtmError::Protocol(
            "native host closed the connection before the contest was downloaded".to_owned(),
        )),
    }
}

/// Write one directory per task under `parent/<contest_id>`: samples in `in/` and `out/`, plus
/// a `metadata.json`. Returns the contest directory.
pub fn build_workspace(parent: &Path, result: &GenResult, user_config: &UserConfig) -> Result<PathBuf> {
    let contest_dir = parent.join(single_component(&result.contest_id)?);
    fs::create_dir_all(&contest_dir)
        .map_err(|e| AtmError::io(format!("could not create {}", contest_dir.display()), e))?;

    let lang = user_config
        .lang
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_else(|| DEFAULT_LANG.to_owned());
    let extension = match language::by_symbol(&lang) {
        Some(profile) => profile.extensions[0],
        None => {
            warn!("unknown preferred language '{lang}', naming sources after cpp");
            ".cpp"
        }
    };
    let code_filename = format!("main{extension}");

    for task in &result.tasks {
        let task_dir = contest_dir.join(single_component(&task.label)?);
        write_samples(&task_dir, &task.samples)?;
        TaskMetadata::new(
            &result.contest_id,
            &task.label,
            &task.screen_name,
            &lang,
            &code_filename,
        )
        .save(&task_dir)?;
        info!(task = %task.label, samples = task.samples.len(), "task written");
    }
    Ok(contest_dir)
}

/// Names coming from the agent become directory names; they must not escape `parent`.
fn single_component(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(AtmError::Protocol(format!("invalid directory name '{name}'"))),
    }
}
