//! Console key bindings.

use crate::cli::keys::{parse_line, Input, Screen};
use mdm_core::manager::{Command, CreateSpec, Motion, SearchDirection};
use mdm_core::registry::FilterMode;

fn cmd(line: &str) -> Command {
    match parse_line(line, 1024) {
        Ok(Input::Command(c)) => c,
        other => panic!("expected command for {:?}, got {:?}", line, other),
    }
}

#[test]
fn empty_line_refreshes() {
    assert_eq!(parse_line("", 1024), Ok(Input::Refresh));
    assert_eq!(parse_line("   ", 1024), Ok(Input::Refresh));
}

#[test]
fn quit_and_screens() {
    assert_eq!(parse_line("q", 1), Ok(Input::Quit));
    assert_eq!(parse_line("Q", 1), Ok(Input::Quit));
    assert_eq!(parse_line("i", 1), Ok(Input::Show(Screen::Detail)));
    assert_eq!(parse_line("l", 1), Ok(Input::Show(Screen::Log)));
    assert_eq!(parse_line("?", 1), Ok(Input::Show(Screen::Help)));
    assert_eq!(parse_line("v", 1), Ok(Input::Show(Screen::List)));
}

#[test]
fn digits_switch_mode() {
    assert_eq!(cmd("1"), Command::SwitchMode(FilterMode::All));
    assert_eq!(cmd("4"), Command::SwitchMode(FilterMode::Active));
    assert_eq!(cmd("6"), Command::SwitchMode(FilterMode::Failed));
    assert!(parse_line("7", 1).is_err());
}

#[test]
fn add_with_and_without_name() {
    assert_eq!(cmd("a http://h/x"), Command::Create(CreateSpec::new("http://h/x")));
    assert_eq!(
        cmd("A http://h/x out.bin"),
        Command::Create(CreateSpec {
            overwrite: true,
            name: Some("out.bin".into()),
            ..CreateSpec::new("http://h/x")
        })
    );
    assert!(parse_line("a", 1).is_err());
}

#[test]
fn record_commands() {
    assert_eq!(cmd("p"), Command::TogglePause);
    assert_eq!(cmd("S"), Command::ToggleAll);
    assert_eq!(cmd("H"), Command::Halt);
    assert_eq!(cmd("h"), Command::Unhalt);
    assert_eq!(cmd("D"), Command::Delete);
    assert_eq!(cmd("+"), Command::AdjustSpeed(1024));
    assert_eq!(cmd("-"), Command::AdjustSpeed(-1024));
}

#[test]
fn referer_set_and_clear() {
    assert_eq!(
        cmd("R http://ref/"),
        Command::SetReferer(Some("http://ref/".into()))
    );
    assert_eq!(cmd("R"), Command::SetReferer(None));
}

#[test]
fn search_keys() {
    assert_eq!(
        cmd("/iso"),
        Command::Search {
            text: "iso".into(),
            direction: SearchDirection::Forward
        }
    );
    assert_eq!(cmd("n"), Command::RepeatSearch(SearchDirection::Forward));
    assert_eq!(cmd("N"), Command::RepeatSearch(SearchDirection::Backward));
    assert!(parse_line("/", 1).is_err());
}

#[test]
fn motions() {
    assert_eq!(cmd("j"), Command::Navigate(Motion::Down));
    assert_eq!(cmd("k"), Command::Navigate(Motion::Up));
    assert_eq!(cmd("J"), Command::Navigate(Motion::PageDown));
    assert_eq!(cmd("K"), Command::Navigate(Motion::PageUp));
    assert_eq!(cmd("g"), Command::Navigate(Motion::Home));
    assert_eq!(cmd("G"), Command::Navigate(Motion::End));
    assert_eq!(cmd("=3"), Command::Navigate(Motion::Position(2)));
    assert!(parse_line("=0", 1).is_err());
    assert!(parse_line("=x", 1).is_err());
}

#[test]
fn unknown_key() {
    assert!(parse_line("z", 1).unwrap_err().contains("unknown key"));
}
