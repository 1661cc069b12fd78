use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::{ChecklistApiClient, DirectoryTemplateSource};
use crate::checklist::clock::SystemClock;
use crate::checklist::ncr::NcrPhoto;
use crate::checklist::session::{ExecSession, HoldRelease};
use crate::cli::commands::{api_client, print_views, TerminalStatusSink};
use crate::config::ChecklistConfig;

/// One line of operator input. Step numbers are 1-based on the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Press(usize),
    Release,
    Pass(usize),
    Fail(usize),
    Ncr(usize),
    Category(String),
    Description(String),
    Photo(PathBuf),
    Save,
    Cancel,
    Status,
    Finalize,
    Reset,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let step = |rest: &str| -> Result<usize, String> {
        match rest.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(format!("'{}' expects a step number (1, 2, ...)", verb)),
        }
    };

    match verb.to_ascii_lowercase().as_str() {
        "press" | "p" => step(rest).map(Input::Press),
        "release" | "r" => Ok(Input::Release),
        "ok" | "pass" => step(rest).map(Input::Pass),
        "nok" | "fail" => step(rest).map(Input::Fail),
        "ncr" => step(rest).map(Input::Ncr),
        "cat" => Ok(Input::Category(rest.to_string())),
        "desc" => Ok(Input::Description(rest.to_string())),
        "photo" if !rest.is_empty() => Ok(Input::Photo(PathBuf::from(rest))),
        "photo" => Err("'photo' expects a file path".to_string()),
        "save" => Ok(Input::Save),
        "cancel" => Ok(Input::Cancel),
        "status" | "s" | "" => Ok(Input::Status),
        "finalize" | "done" => Ok(Input::Finalize),
        "reset" => Ok(Input::Reset),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" | "q" => Ok(Input::Quit),
        other => Err(format!("unknown command '{}' (type 'help')", other)),
    }
}

pub struct ExecCommand {
    pub serial: String,
    pub operator: Option<String>,
    pub file: Option<PathBuf>,
    pub offline: bool,
}

impl ExecCommand {
    pub fn new(serial: String) -> Self {
        Self {
            serial,
            operator: None,
            file: None,
            offline: false,
        }
    }

    pub fn with_operator(mut self, operator: Option<String>) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub async fn execute(&self, config: &ChecklistConfig) -> Result<()> {
        let client = api_client(config)?;
        let mut session = ExecSession::from_config(SystemClock, &config.execution)
            .with_status_sink(Arc::new(TerminalStatusSink));
        session.set_serial(&self.serial);
        session.set_operator(self.operator.as_deref());

        self.load(&mut session, &client, config).await?;
        print_help();
        print_views(&session.views());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut ticker = tokio::time::interval(config.execution.tick_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(index) = session.tick() {
                        println!("▶️  Step {} started", index + 1);
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        println!("👋 Input closed; leaving without recording");
                        return Ok(());
                    };
                    match parse_input(&line) {
                        Ok(Input::Quit) => return Ok(()),
                        Ok(input) => {
                            if self.handle(&mut session, &client, input).await {
                                return Ok(());
                            }
                        }
                        Err(message) => println!("❓ {}", message),
                    }
                }
            }
        }
    }

    async fn load(
        &self,
        session: &mut ExecSession,
        client: &ChecklistApiClient,
        config: &ChecklistConfig,
    ) -> Result<()> {
        if let Some(file) = &self.file {
            return Ok(session.load_file(file)?);
        }
        let directory = DirectoryTemplateSource::from_config(&config.templates);
        if self.offline {
            let source = directory.ok_or_else(|| anyhow::anyhow!("templates.directory is not configured"))?;
            return Ok(session.load_by_serial(&source).await?);
        }
        match session.load_by_serial(client).await {
            Err(e) if e.is_transport() => match directory {
                Some(source) => {
                    println!("⚠️  Backend unavailable ({}); trying {}", e, source.directory().display());
                    Ok(session.load_by_serial(&source).await?)
                }
                None => Err(e.into()),
            },
            other => Ok(other?),
        }
    }

    /// Apply one operator input. Returns true once the run is recorded.
    async fn handle(
        &self,
        session: &mut ExecSession,
        client: &ChecklistApiClient,
        input: Input,
    ) -> bool {
        match input {
            Input::Press(i) => {
                if session.press(i) {
                    println!("✋ Holding step {}... ('release' to cancel)", i + 1);
                } else {
                    println!("🚫 Step {} cannot be started now", i + 1);
                }
            }
            Input::Release => match session.release() {
                HoldRelease::Started(i) => println!("▶️  Step {} started", i + 1),
                HoldRelease::Cancelled => println!("↩️  Start cancelled"),
                HoldRelease::NotHeld => {}
            },
            Input::Pass(i) => report_finish(session.mark_passed(i), i, "OK"),
            Input::Fail(i) => {
                report_finish(session.mark_failed(i), i, "NOK");
                if session.ncr_draft().is_some() {
                    print_draft_help(session);
                }
            }
            Input::Ncr(i) => {
                if session.open_ncr(i) {
                    print_draft_help(session);
                } else {
                    println!("🚫 Cannot record an occurrence on step {}", i + 1);
                }
            }
            Input::Category(text) => report_draft_edit(session.set_ncr_category(&text)),
            Input::Description(text) => report_draft_edit(session.set_ncr_description(&text)),
            Input::Photo(path) => match NcrPhoto::from_file(&path) {
                Ok(photo) => report_draft_edit(session.set_ncr_photo(Some(photo))),
                Err(e) => println!("❌ Cannot read {}: {}", path.display(), e),
            },
            Input::Save => {
                if session.save_ncr() {
                    println!("📝 Occurrence recorded");
                } else {
                    println!("🚫 No occurrence open");
                }
            }
            Input::Cancel => {
                if session.cancel_ncr() {
                    println!("↩️  Occurrence discarded");
                }
            }
            Input::Status => print_views(&session.views()),
            Input::Finalize => match session.finalize(client).await {
                Ok(record) => {
                    println!(
                        "🏁 {} recorded for {}: {} items, result {:?}",
                        record.model,
                        record.serial,
                        record.items.len(),
                        record.result
                    );
                    return true;
                }
                Err(e) => println!("❌ {}", e),
            },
            Input::Reset => {
                session.reset_run();
                println!("🔄 Run reset; every step is pending again");
                print_views(&session.views());
            }
            Input::Help => print_help(),
            Input::Quit => return true,
        }
        false
    }
}

fn report_finish(finished: bool, index: usize, outcome: &str) {
    if finished {
        println!("✅ Step {} marked {}", index + 1, outcome);
    } else {
        println!(
            "🚫 Step {} cannot be closed yet (must be running and past its minimum time)",
            index + 1
        );
    }
}

fn report_draft_edit(applied: bool) {
    if !applied {
        println!("🚫 No occurrence open ('ncr <step>' first)");
    }
}

fn print_draft_help(session: &ExecSession) {
    let tags = session.suggested_tags();
    if let Some(draft) = session.ncr_draft() {
        println!("📝 Occurrence for step {}: 'cat', 'desc', 'photo', then 'save' or 'cancel'", draft.step + 1);
    }
    if !tags.is_empty() {
        println!("   🏷️  Suggested: {}", tags.join(", "));
    }
}

fn print_help() {
    println!("⌨️  Commands:");
    println!("   press <n> / release     hold to start step n (starts after the hold time)");
    println!("   ok <n> / nok <n>        close the running step");
    println!("   ncr <n>                 open an occurrence for step n");
    println!("   cat|desc <text>, photo <path>, save, cancel");
    println!("   status, finalize, reset, quit");
    println!();
}
