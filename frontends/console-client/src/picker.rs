use crate::status::StatusLine;
use console_protocol::{ConsoleError, ServerCandidate};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Lines, Stdin};

pub const CANCEL: &str = "x";

/// Source of answers for the server menu.
pub trait Prompt {
    /// Show `menu` and wait for one answer. `None` means no more input will come.
    fn ask(&mut self, menu: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Reads answers line by line, printing the menu to stderr.
pub struct LinePrompt<R> {
    lines: Lines<BufReader<R>>,
}

pub type StdinPrompt = LinePrompt<Stdin>;

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> LinePrompt<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: BufReader::new(input).lines(),
        }
    }

    /// Give the input back, including anything typed ahead of the last answer.
    pub fn into_reader(self) -> BufReader<R> {
        self.lines.into_inner()
    }
}

impl<R: AsyncRead + Unpin + Send> Prompt for LinePrompt<R> {
    async fn ask(&mut self, menu: &str) -> Option<String> {
        let mut err = tokio::io::stderr();
        let _ = err.write_all(format!("{menu} ").as_bytes()).await;
        let _ = err.flush().await;
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Prompt read failed: {e}");
                None
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Pick(usize),
    Cancel,
    Empty,
    Invalid,
}

fn parse_answer(answer: &str, count: usize) -> Answer {
    let answer = answer.trim();
    if answer.is_empty() {
        return Answer::Empty;
    }
    if answer == CANCEL {
        return Answer::Cancel;
    }
    match answer.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Answer::Pick(n - 1),
        _ => Answer::Invalid,
    }
}

pub fn render_menu(candidates: &[ServerCandidate]) -> String {
    let mut menu = String::from("Available Servers:\n");
    for (i, candidate) in candidates.iter().enumerate() {
        menu += &format!("[{}] {}\n", i + 1, candidate.display_name);
    }
    menu += &format!("[{CANCEL}] Cancel\n\nEnter serial no of server :");
    menu
}

/// Choose the server to open an application console on.
///
/// A single candidate is taken without asking. Otherwise the menu is shown
/// until a valid number or the cancel key is entered.
pub async fn pick<'a, P, S>(
    candidates: &'a [ServerCandidate],
    prompt: &mut P,
    status: &mut S,
) -> Result<&'a ServerCandidate, ConsoleError>
where
    P: Prompt,
    S: StatusLine,
{
    match candidates {
        [] => return Err(ConsoleError::NoServersAvailable),
        [only] => return Ok(only),
        _ => {}
    }

    status.show("Select preferred server to connect for application console");
    let menu = render_menu(candidates);
    loop {
        let Some(answer) = prompt.ask(&menu).await else {
            tracing::info!("Prompt input closed, treating as cancel");
            return Err(ConsoleError::UserCancelled);
        };
        match parse_answer(&answer, candidates.len()) {
            Answer::Pick(idx) => return Ok(&candidates[idx]),
            Answer::Cancel => return Err(ConsoleError::UserCancelled),
            Answer::Empty => status.show("Error: No server selected"),
            Answer::Invalid => tracing::debug!("Ignoring server choice {answer:?}"),
        }
    }
}
