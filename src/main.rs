use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use assessment_client::config::{get_config, init_config};
use assessment_client::models::test_attempt::AnswerValue;
use assessment_client::{ApiClient, AppLifecycle, AttemptController, Screen, SessionEvent};

/// Terminal runner for taking a test against a live backend. Drives the
/// attempt engine end-to-end: overview, start/resume, answers with
/// auto-save, violation simulation, and submission.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let slug = std::env::args()
        .nth(1)
        .context("usage: assessment-client <test-slug>")?;

    let client = ApiClient::from_config(config)?;
    let (controller, mut events) = AttemptController::new(client, slug);

    if let Err(err) = controller.load().await {
        if err.is_timeout() {
            anyhow::bail!("failed to load test: request timed out, is the API reachable?");
        }
        anyhow::bail!("failed to load test: {err}");
    }
    print_status(&controller);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => print_event(event),
                    None => break,
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_command(&controller, line.trim(), &mut lines).await {
                    break;
                }
            }
        }
    }

    controller.shutdown();
    Ok(())
}

async fn run_command(
    controller: &AttemptController<ApiClient>,
    line: &str,
    lines: &mut Lines<BufReader<Stdin>>,
) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "help" => print_help(),
        "status" => print_status(controller),
        "items" => print_items(controller),
        "start" => {
            if let Err(err) = controller.start_test().await {
                println!("cannot start: {err}");
            } else {
                print_status(controller);
            }
        }
        "answer" => {
            let Some((item, value)) = rest.split_once(' ') else {
                println!("usage: answer <item-id> <value>");
                return true;
            };
            match item.parse::<i64>() {
                Ok(item_id) => controller.record_answer(item_id, parse_answer(value.trim())),
                Err(_) => println!("item id must be a number"),
            }
        }
        "submit" => {
            if let Some(warning) = controller.check_incomplete_submit() {
                println!("{warning} (y/n)");
                let confirmed = matches!(
                    lines.next_line().await,
                    Ok(Some(reply)) if reply.trim().eq_ignore_ascii_case("y")
                );
                if !confirmed {
                    println!("submission cancelled");
                    return true;
                }
            }
            if let Err(err) = controller.submit().await {
                println!("submission failed: {err}");
            }
        }
        "background" => {
            // Simulates the app losing the foreground and coming back.
            controller.on_app_state_change(AppLifecycle::Background).await;
            controller.on_app_state_change(AppLifecycle::Active).await;
        }
        "back" => {
            controller.back_to_overview();
            print_status(controller);
        }
        "again" => {
            if let Err(err) = controller.try_again().await {
                println!("cannot retry: {err}");
            } else {
                print_status(controller);
            }
        }
        "quit" | "exit" => return false,
        other => println!("unknown command: {other} (try 'help')"),
    }
    true
}

fn parse_answer(raw: &str) -> AnswerValue {
    if let Ok(flag) = raw.parse::<bool>() {
        return AnswerValue::Bool(flag);
    }
    if let Ok(choice) = raw.parse::<u32>() {
        return AnswerValue::Choice(choice);
    }
    AnswerValue::Text(raw.to_string())
}

fn print_event(event: SessionEvent) {
    match event {
        SessionEvent::ViolationRecorded {
            kind,
            count,
            remaining,
        } => {
            println!(
                "WARNING: {} detected (violation {} of allowed {}, {} left before forced submission)",
                kind.label(),
                count,
                count + remaining,
                remaining
            );
        }
        SessionEvent::ForcedSubmission { reason } => {
            println!("FORCED SUBMISSION: {reason}");
        }
        SessionEvent::TimeExpired => println!("Time is up! Submitting your answers."),
        SessionEvent::Submitted { result } => {
            println!(
                "Submitted: {:.1}/{:.1} points ({:.0}%) — {}{}",
                result.score,
                result.total_points,
                result.percentage,
                if result.passed { "passed" } else { "not passed" },
                if result.needs_manual_grading {
                    " (some items await manual grading)"
                } else {
                    ""
                }
            );
        }
        SessionEvent::SubmitFailed { message } => println!("Submission failed: {message}"),
    }
}

fn print_status(controller: &AttemptController<ApiClient>) {
    let Some(test) = controller.test() else {
        println!("loading...");
        return;
    };

    match controller.screen() {
        Screen::Loading => println!("loading..."),
        Screen::Overview => {
            println!("== {} ==", test.title);
            if let Some(description) = &test.description {
                println!("{description}");
            }
            match test.duration_minutes {
                Some(minutes) => println!("duration: {minutes} min"),
                None => println!("duration: untimed"),
            }
            println!("total points: {}", test.total_points);
            if let Some(stats) = controller.student_stats() {
                let allowed = match test.max_attempts {
                    0 => "unlimited".to_string(),
                    n => n.to_string(),
                };
                println!("attempts used: {} of {allowed}", stats.attempts_used);
            }
            println!(
                "can start: {}",
                if controller.can_start_attempt() { "yes" } else { "no" }
            );
        }
        Screen::Attempt => {
            let answered = controller
                .answers()
                .values()
                .filter(|value| !value.is_empty())
                .count();
            println!(
                "attempt in progress: {answered}/{} answered",
                test.items.len()
            );
            match controller.time_left() {
                Some(seconds) => println!("time left: {}:{:02}", seconds / 60, seconds % 60),
                None => println!("time left: untimed"),
            }
            let violations = controller.violations();
            if !violations.is_empty() {
                println!("violations this session: {}", violations.len());
            }
        }
        Screen::Result | Screen::ViewResult => {
            if let Some(result) = controller.result() {
                println!(
                    "result: {:.1}/{:.1} ({:.0}%) — {}",
                    result.score,
                    result.total_points,
                    result.percentage,
                    if result.passed { "passed" } else { "not passed" }
                );
                if result.needs_manual_grading {
                    println!(
                        "graded {} of {} items, the rest await manual grading",
                        result.graded_items, result.total_items
                    );
                }
                if result.violations_count > 0 {
                    println!("violations on record: {}", result.violations_count);
                }
            }
        }
    }
}

fn print_items(controller: &AttemptController<ApiClient>) {
    let Some(test) = controller.test() else {
        println!("no test loaded");
        return;
    };
    let answers = controller.answers();
    for item in &test.items {
        let answered = answers
            .get(&item.id)
            .map(|value| !value.is_empty())
            .unwrap_or(false);
        println!(
            "[{}] #{} ({} pts, {}) {}",
            if answered { "x" } else { " " },
            item.id,
            item.points,
            item.payload.kind(),
            item.payload.prompt()
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  status             current screen, timer, progress");
    println!("  items              list questions and answered state");
    println!("  start              start a fresh attempt");
    println!("  answer <id> <val>  record an answer (auto-saved)");
    println!("  submit             submit the attempt");
    println!("  background         simulate the app leaving the foreground");
    println!("  back               return to the overview");
    println!("  again              try again (new attempt)");
    println!("  quit               leave (cancels timers)");
}
