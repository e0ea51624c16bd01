use feed::Filter;
use lobby::{Hub, Session, Snapshot};
use model::{mutation::ReportReason, ParticipantTag, QuestionId, Status};
use std::{env, sync::Arc};
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    runtime::Runtime,
    signal,
};

/// What a line typed into the terminal asks for.
enum Command<'line> {
    Ask(&'line str),
    Upvote(QuestionId),
    Report(QuestionId, ReportReason),
    Filter(Filter),
    Refresh,
    Quit,
}

fn parse(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    Some(match verb {
        "ask" if !rest.is_empty() => Command::Ask(rest),
        "upvote" if !rest.is_empty() => Command::Upvote(QuestionId::from(rest)),
        "report" => {
            let (id, reason) = rest.split_once(char::is_whitespace)?;
            Command::Report(QuestionId::from(id), reason.trim().parse().ok()?)
        }
        "filter" => Command::Filter(rest.parse().ok()?),
        "refresh" => Command::Refresh,
        "quit" | "exit" => Command::Quit,
        _ => return None,
    })
}

/// Lines describing the feed under `filter`. The live feed is shown even while
/// the snapshot is missing, since the stream keeps delivering.
fn describe(session: &Session<api::Client>, snapshot: &Snapshot, filter: Filter) -> Vec<String> {
    let (shown, counts) = session.view(filter);
    let tabs: Vec<_> = Filter::EVERY
        .into_iter()
        .map(|tab| {
            let marker = if tab == filter { "*" } else { "" };
            format!("{marker}{} ({})", tab.label(), counts.get(tab))
        })
        .collect();

    let mut lines = Vec::from([format!("{}: {}", session.room().name, tabs.join(" | "))]);
    if shown.is_empty() {
        let empty = if snapshot.loaded { "No questions yet." } else { "Loading questions..." };
        lines.push(String::from(empty));
    }
    for question in shown {
        let status = match question.status {
            Status::Pending => "pending",
            Status::Answered => "answered",
        };
        let mine = if question.mine { " (you)" } else { "" };
        lines.push(format!("[{}] +{} {status}{mine}: {}", question.id, question.upvotes, question.text));
        if let Some(answer) = &question.answer {
            lines.push(format!("    answer: {answer}"));
        }
    }
    lines
}

/// Returns the snapshot error if it differs from the one last reported.
fn fresh_error<'s>(reported: &mut Option<api::error::Error>, snapshot: &'s Snapshot) -> Option<&'s api::error::Error> {
    if *reported == snapshot.error {
        return None;
    }
    reported.clone_from(&snapshot.error);
    snapshot.error.as_ref()
}

fn render(session: &Session<api::Client>, snapshot: &Snapshot, filter: Filter) {
    for line in describe(session, snapshot, filter) {
        log::info!("{line}");
    }
}

/// Runs a submission and reports its outcome.
async fn submit(session: &Session<api::Client>, command: Command<'_>) {
    match command {
        Command::Ask(text) => match session.ask(text).await {
            Ok(()) => log::info!("question submitted"),
            Err(err) => log::warn!("{err}"),
        },
        Command::Upvote(id) => match session.upvote(&id).await {
            Ok(upvotes) => log::info!("upvoted {id}, server now counts {upvotes}"),
            Err(err) => log::warn!("{err}"),
        },
        Command::Report(id, reason) => match session.report(&id, reason).await {
            Ok(()) => log::info!("reported {id} as {reason}"),
            Err(err) => log::warn!("{err}"),
        },
        Command::Filter(_) | Command::Refresh | Command::Quit => {}
    }
}

async fn run(session: Session<api::Client>) -> anyhow::Result<()> {
    let mut state = session.watch();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut filter = Filter::All;
    let mut reported = None;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                log::info!("interrupted");
                break;
            }
            res = state.changed() => {
                if res.is_err() {
                    log::error!("room feed stopped unexpectedly");
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if let Some(err) = fresh_error(&mut reported, &snapshot) {
                    log::warn!("{err} Type `refresh` to try again.");
                }
                render(&session, &snapshot, filter);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let Some(command) = parse(&line) else {
                    log::warn!("usage: ask <text> | upvote <id> | report <id> <spam|inappropriate|off-topic> | filter <all|mine|pending|answered> | refresh | quit");
                    continue;
                };
                match command {
                    Command::Filter(next) => {
                        filter = next;
                        render(&session, &session.snapshot(), filter);
                    }
                    Command::Refresh => session.refresh()?,
                    Command::Quit => break,
                    command => tokio::select! {
                        res = &mut ctrl_c => {
                            res?;
                            log::info!("interrupted");
                            break;
                        }
                        () = submit(&session, command) => {}
                    },
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse environment variables
    let base = env::var("API_URL")?;
    let room = env::var("ROOM")?;
    let me = ParticipantTag::from(env::var("STUDENT_TAG")?);

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let client = api::Client::new(&base).map_err(|err| anyhow::anyhow!("{base}: {err}"))?;
        let context = match client.resolve_room(&room).await {
            Ok(context) => context,
            Err(err) => {
                log::error!("cannot open room {room}: {err}");
                anyhow::bail!("room resolution failed");
            }
        };

        // The hub follows whichever room the session joins.
        let hub = Arc::new(Hub::default());
        let driver = tokio::spawn(Arc::clone(&hub).drive(client.clone()));
        let session = Session::activate(Arc::new(client), hub, context, me);

        let result = run(session).await;
        driver.abort();
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert!(matches!(parse("ask  Is it on the exam? "), Some(Command::Ask("Is it on the exam?"))));
        assert!(matches!(parse("upvote q1"), Some(Command::Upvote(id)) if id.as_str() == "q1"));
        assert!(matches!(
            parse("report q1 Off-Topic"),
            Some(Command::Report(id, ReportReason::OffTopic)) if id.as_str() == "q1"
        ));
        assert!(matches!(parse("filter mine"), Some(Command::Filter(Filter::Mine))));
        assert!(matches!(parse("refresh"), Some(Command::Refresh)));
        assert!(matches!(parse("quit"), Some(Command::Quit)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn live_questions_show_while_snapshot_is_missing() {
        use model::{RoomCode, RoomContext, RoomId, RoomStatus, Visibility};

        // Nothing listens on this port, so the snapshot fetch fails.
        let client = api::Client::new("http://127.0.0.1:9/").unwrap();
        let hub = Arc::new(Hub::default());
        let room = RoomContext {
            id: RoomId::from("r1"),
            code: RoomCode::from("XK42QZ"),
            name: "CS 101".into(),
            lecturer: None,
            visibility: Visibility::Public,
            status: RoomStatus::Active,
        };
        let session = Session::activate(Arc::new(client), Arc::clone(&hub), room, ParticipantTag::from("Student#1"));
        let mut state = session.watch();
        state.wait_for(|s| s.error.is_some()).await.unwrap();

        hub.dispatch(
            lobby::EventName::NewQuestion,
            r#"{"_id":"x","questionText":"Is it recorded?","studentTag":"Student#2"}"#,
        );
        let snapshot = state.wait_for(|s| !s.questions.is_empty()).await.unwrap().clone();
        assert!(!snapshot.loaded);

        let lines = describe(&session, &snapshot, Filter::All);
        assert_eq!(lines[0], "CS 101: *All (1) | My Questions (0) | Pending (1) | Answered (0)");
        assert_eq!(lines[1], "[x] +0 pending: Is it recorded?");
        session.close().await;
    }

    #[test]
    fn errors_are_reported_once_per_change() {
        let failed = Snapshot { error: Some(api::error::Error::FailedFetch), ..Snapshot::default() };
        let mut reported = None;
        assert_eq!(fresh_error(&mut reported, &failed), Some(&api::error::Error::FailedFetch));
        assert_eq!(fresh_error(&mut reported, &failed), None);

        let recovered = Snapshot { loaded: true, ..Snapshot::default() };
        assert_eq!(fresh_error(&mut reported, &recovered), None);
        assert_eq!(reported, None);
        assert!(fresh_error(&mut reported, &failed).is_some());
    }

    #[test]
    fn rejects_incomplete_commands() {
        assert!(parse("ask").is_none());
        assert!(parse("report q1").is_none());
        assert!(parse("report q1 rude").is_none());
        assert!(parse("filter everything").is_none());
        assert!(parse("shout").is_none());
    }
}
