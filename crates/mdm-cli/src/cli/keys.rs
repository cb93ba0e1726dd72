//! Line-oriented key bindings: each console line is one keystroke, optionally
//! followed by an argument (`a URL [NAME]`, `/text`, `=N`).

use mdm_core::manager::{Command, CreateSpec, Motion, SearchDirection};
use mdm_core::registry::FilterMode;

/// Screens the console can draw instead of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    List,
    Detail,
    Log,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Show(Screen),
    Refresh,
    Quit,
}

/// Maps one input line. `speed_step` is the `+`/`-` increment in bytes per second.
pub fn parse_line(line: &str, speed_step: u64) -> Result<Input, String> {
    let line = line.trim();
    let Some(key) = line.chars().next() else {
        return Ok(Input::Refresh);
    };
    let rest = line[key.len_utf8()..].trim();
    let step = i64::try_from(speed_step).unwrap_or(i64::MAX);

    let input = match key {
        'q' | 'Q' => Input::Quit,
        '?' => Input::Show(Screen::Help),
        'i' => Input::Show(Screen::Detail),
        'l' => Input::Show(Screen::Log),
        'v' => Input::Show(Screen::List),
        '1'..='6' => {
            let idx = key as usize - '1' as usize;
            Input::Command(Command::SwitchMode(FilterMode::ALL[idx]))
        }
        'a' | 'A' => {
            let mut words = rest.split_whitespace();
            let Some(locator) = words.next() else {
                return Err(format!("usage: {} URL [NAME]", key));
            };
            Input::Command(Command::Create(CreateSpec {
                overwrite: key == 'A',
                name: words.next().map(str::to_string),
                ..CreateSpec::new(locator)
            }))
        }
        'p' => Input::Command(Command::TogglePause),
        'S' => Input::Command(Command::ToggleAll),
        'h' => Input::Command(Command::Unhalt),
        'H' => Input::Command(Command::Halt),
        'D' => Input::Command(Command::Delete),
        'R' => Input::Command(Command::SetReferer(
            (!rest.is_empty()).then(|| rest.to_string()),
        )),
        '+' => Input::Command(Command::AdjustSpeed(step)),
        '-' => Input::Command(Command::AdjustSpeed(-step)),
        '/' => {
            if rest.is_empty() {
                return Err("usage: /TEXT".into());
            }
            Input::Command(Command::Search {
                text: rest.to_string(),
                direction: SearchDirection::Forward,
            })
        }
        'n' => Input::Command(Command::RepeatSearch(SearchDirection::Forward)),
        'N' => Input::Command(Command::RepeatSearch(SearchDirection::Backward)),
        'j' => Input::Command(Command::Navigate(Motion::Down)),
        'k' => Input::Command(Command::Navigate(Motion::Up)),
        'J' => Input::Command(Command::Navigate(Motion::PageDown)),
        'K' => Input::Command(Command::Navigate(Motion::PageUp)),
        'g' => Input::Command(Command::Navigate(Motion::Home)),
        'G' => Input::Command(Command::Navigate(Motion::End)),
        '=' => {
            let n: usize = rest
                .parse()
                .map_err(|_| format!("usage: =N (row number), got {:?}", rest))?;
            if n == 0 {
                return Err("rows are numbered from 1".into());
            }
            Input::Command(Command::Navigate(Motion::Position(n - 1)))
        }
        other => return Err(format!("unknown key {:?}; ? for help", other)),
    };
    Ok(input)
}

pub const HELP: &[(&str, &str)] = &[
    ("a URL [NAME]", "add a download (resumes an existing file)"),
    ("A URL [NAME]", "add a download, overwriting an existing file"),
    ("p", "pause or resume the selected download"),
    ("S", "start or stop all downloads"),
    ("H / h", "halt / unhalt the selected download"),
    ("D", "delete the selected download"),
    ("R [REFERER]", "set or clear the referer"),
    ("+ / -", "raise / lower the speed cap"),
    ("/TEXT", "search names"),
    ("n / N", "repeat search forward / backward"),
    ("j / k", "move down / up"),
    ("J / K", "page down / up"),
    ("g / G", "first / last"),
    ("=N", "jump to row N"),
    ("1-6", "show all, inactive, paused, active, finished, failed"),
    ("i", "details of the selected download"),
    ("l", "event log"),
    ("v", "back to the list"),
    ("?", "this help"),
    ("q", "quit"),
    ("(empty)", "refresh"),
];
