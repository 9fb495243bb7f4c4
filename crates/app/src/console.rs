//! Line-driven exam console over a [`SessionController`].
//!
//! Each input line stands in for a key press or page action of a browser
//! front end; the background loops keep running while the prompt waits.

use std::io;

use exam_core::format::{TimeUrgency, format_clock, format_time_spent, time_remaining_text};
use exam_core::keyboard::{Key, Modifiers};
use exam_core::progress::QuestionState;
use services::{SessionController, SessionEvent, SessionRuntime};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Key(Key, Modifiers),
    Submit,
    GoTo(usize),
    Resume,
    Abandon,
    Hide,
    Show,
    ShowPalette,
    Help,
    Quit,
}

fn parse_action(line: &str) -> Option<Action> {
    let line = line.trim();
    let none = Modifiers::none();
    let action = match line {
        "n" | "next" => Action::Key(Key::ArrowRight, none),
        "p" | "prev" => Action::Key(Key::ArrowLeft, none),
        "f" | "flag" => Action::Key(Key::Char('f'), none),
        "pause" => Action::Key(Key::Space, none),
        "resume" => Action::Resume,
        "submit" => Action::Submit,
        "abandon" => Action::Abandon,
        "hide" => Action::Hide,
        "show" => Action::Show,
        "palette" => Action::ShowPalette,
        "?" | "help" => Action::Help,
        "q" | "quit" => Action::Quit,
        _ => {
            if let Some(number) = line.strip_prefix("g ").or_else(|| line.strip_prefix("go ")) {
                let number: usize = number.trim().parse().ok()?;
                return number.checked_sub(1).map(Action::GoTo);
            }
            let mut chars = line.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Action::Key(Key::Char(c), none),
                _ => return None,
            }
        }
    };
    Some(action)
}

fn print_help() {
    println!("Commands:");
    println!("  1-4 / a-d    select an option        n / p      next / previous question");
    println!("  f            flag for review         g <n>      go to question n");
    println!("  pause        pause the exam          resume     resume a paused exam");
    println!("  submit       submit the exam         abandon    give up this attempt");
    println!("  hide / show  leave / return to tab   palette    question overview");
    println!("  ?            this help               q          leave the console");
}

fn palette_symbol(state: QuestionState) -> char {
    match state {
        QuestionState::NotVisited => '.',
        QuestionState::Visited => 'o',
        QuestionState::Answered => '#',
        QuestionState::MarkedForReview => '?',
    }
}

fn render_palette(controller: &SessionController) {
    let current = controller.current_index();
    let cells: Vec<String> = controller
        .palette()
        .into_iter()
        .enumerate()
        .map(|(index, state)| {
            let symbol = palette_symbol(state);
            if index == current {
                format!("[{}{symbol}]", index + 1)
            } else {
                format!(" {}{symbol} ", index + 1)
            }
        })
        .collect();
    println!("{}", cells.join(""));
    let progress = controller.progress();
    println!(
        "answered {}  unanswered {}  review {}  ({:.0}%)",
        progress.answered,
        progress.unanswered,
        progress.marked_for_review,
        progress.percentage_complete
    );
}

fn render(controller: &SessionController) {
    let Some(question) = controller.current_question() else {
        return;
    };
    let remaining = controller
        .remaining_seconds()
        .map_or_else(|| "--:--".to_string(), format_clock);
    let flag = if controller.is_marked_for_review(question.id()) {
        "  [review]"
    } else {
        ""
    };
    println!();
    println!(
        "Question {}/{}{flag}   {}   {}",
        question.number(),
        controller.questions().len(),
        remaining,
        controller.status()
    );
    println!("{}", question.detail().text);
    let selected = controller.selected_option(question.id());
    for (position, option) in question.options().iter().enumerate() {
        let marker = if selected == Some(option.id) { '*' } else { ' ' };
        let label = char::from(b'A' + u8::try_from(position % 26).unwrap_or(0));
        println!(" {marker} {label}) {}", option.text);
    }
}

fn spawn_event_printer(controller: &SessionController) -> JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        let mut urgency = TimeUrgency::Normal;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            match event {
                SessionEvent::Tick {
                    remaining_seconds,
                    urgency: now,
                } if now != urgency => {
                    urgency = now;
                    if now != TimeUrgency::Normal {
                        println!("~ {} left", time_remaining_text(remaining_seconds));
                    }
                }
                SessionEvent::TimeUp => println!("~ time is up, submitting"),
                SessionEvent::Submitted { trigger, status } => {
                    println!("~ exam submitted ({trigger}): {status}");
                }
                SessionEvent::SubmitFailed { message, .. } => {
                    println!("! submit failed: {message}; type `submit` to retry");
                }
                SessionEvent::AnswerFailed { message, .. } => {
                    println!("! answer not saved: {message}; select it again to retry");
                }
                SessionEvent::ControlFailed { operation, message } => {
                    println!("! {operation} failed: {message}");
                }
                SessionEvent::StatusChanged { from, to } => println!("~ {from} -> {to}"),
                SessionEvent::TabHidden { switches } => {
                    println!("~ leaving the exam tab is recorded ({switches} so far)");
                }
                _ => {}
            }
        }
    })
}

async fn confirm(lines: &mut Input, prompt: &str) -> io::Result<bool> {
    println!("{prompt} [y/N]");
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn confirm_submit_prompt(controller: &SessionController) -> String {
    let summary = controller.submit_summary();
    let mut prompt = format!(
        "Submit with {} answered, {} unanswered, {} marked for review?",
        summary.answered, summary.unanswered, summary.marked_for_review
    );
    if !summary.unanswered_numbers.is_empty() {
        let numbers: Vec<String> = summary
            .unanswered_numbers
            .iter()
            .map(ToString::to_string)
            .collect();
        prompt.push_str(&format!("\n  unanswered: {}", numbers.join(", ")));
    }
    prompt
}

async fn apply(
    controller: &SessionController,
    lines: &mut Input,
    action: Action,
) -> io::Result<bool> {
    let outcome = match action {
        Action::Key(key, modifiers) => controller
            .handle_key(key, modifiers)
            .await
            .map(|command| command.is_some()),
        Action::Submit => {
            if !confirm(lines, &confirm_submit_prompt(controller)).await? {
                return Ok(true);
            }
            controller
                .handle_key(Key::Enter, Modifiers::ctrl())
                .await
                .map(|command| command.is_some())
        }
        Action::GoTo(index) => Ok(controller.go_to(index).is_some()),
        Action::Resume => controller.resume().await.map(|_| true),
        Action::Abandon => {
            if !confirm(lines, "Abandon this attempt? It cannot be resumed.").await? {
                return Ok(true);
            }
            controller.abandon().await.map(|_| true)
        }
        Action::Hide => {
            controller.record_visibility(false);
            Ok(true)
        }
        Action::Show => {
            controller.record_visibility(true);
            Ok(true)
        }
        Action::ShowPalette => {
            render_palette(controller);
            return Ok(true);
        }
        Action::Help => {
            print_help();
            return Ok(true);
        }
        Action::Quit => {
            if controller.should_guard_unload()
                && !confirm(lines, "The exam is still running. Leave anyway?").await?
            {
                return Ok(true);
            }
            return Ok(false);
        }
    };
    match outcome {
        Ok(true) => {}
        Ok(false) => println!("(nothing to do)"),
        // Already logged and published by the controller.
        Err(err) => tracing::debug!(error = %err, "console action failed"),
    }
    Ok(true)
}

async fn print_report(controller: &SessionController) {
    match controller.report().await {
        Ok(Some(report)) => {
            let result = report.result;
            println!();
            println!("Result: {}", report.session.status);
            println!(
                "  correct {}  wrong {}  unanswered {}  of {}",
                result.correct_answers,
                result.wrong_answers,
                result.unanswered_questions,
                result.total_questions
            );
            println!(
                "  marks {:.2}/{:.2} (negative {:.2})  score {:.1}%  {}",
                result.marks_obtained,
                result.total_marks,
                result.negative_marks,
                result.score_percentage,
                if report.session.is_passed { "PASSED" } else { "NOT PASSED" }
            );
            let spent: u64 = (0..controller.questions().len())
                .map(|index| controller.time_spent(index))
                .sum();
            println!("  time on questions {}", format_time_spent(spent));
        }
        Ok(None) => println!("Session left open; no report yet."),
        Err(err) => println!("! report unavailable: {err}"),
    }
}

/// Run the console until the session ends or the user leaves.
///
/// # Errors
///
/// Returns stdin read failures.
pub async fn drive(controller: SessionController) -> Result<(), Box<dyn std::error::Error>> {
    let printer = spawn_event_printer(&controller);
    let runtime = SessionRuntime::start(controller.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    render(&controller);
    loop {
        let line = tokio::select! {
            () = controller.shutdown_token().cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        let Some(action) = parse_action(&line) else {
            println!("unknown command; `?` for help");
            continue;
        };
        if !apply(&controller, &mut lines, action).await? || controller.is_terminal() {
            break;
        }
        render(&controller);
    }

    let controller = runtime.shutdown().await;
    printer.abort();
    if controller.is_terminal() {
        print_report(&controller).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_characters_become_key_presses() {
        assert_eq!(
            parse_action("b"),
            Some(Action::Key(Key::Char('b'), Modifiers::none()))
        );
        assert_eq!(
            parse_action(" 3 "),
            Some(Action::Key(Key::Char('3'), Modifiers::none()))
        );
        assert_eq!(
            parse_action("n"),
            Some(Action::Key(Key::ArrowRight, Modifiers::none()))
        );
    }

    #[test]
    fn go_to_is_one_based() {
        assert_eq!(parse_action("g 4"), Some(Action::GoTo(3)));
        assert_eq!(parse_action("go 1"), Some(Action::GoTo(0)));
        assert_eq!(parse_action("g 0"), None);
        assert_eq!(parse_action("g x"), None);
    }

    #[test]
    fn words_map_to_page_actions() {
        assert_eq!(parse_action("submit"), Some(Action::Submit));
        assert_eq!(
            parse_action("pause"),
            Some(Action::Key(Key::Space, Modifiers::none()))
        );
        assert_eq!(parse_action("hide"), Some(Action::Hide));
        assert_eq!(parse_action("whatever"), None);
    }

    #[test]
    fn palette_symbols_are_distinct() {
        let symbols = [
            QuestionState::NotVisited,
            QuestionState::Visited,
            QuestionState::Answered,
            QuestionState::MarkedForReview,
        ]
        .map(palette_symbol);
        for (i, a) in symbols.iter().enumerate() {
            assert!(symbols[i + 1..].iter().all(|b| b != a));
        }
    }
}
