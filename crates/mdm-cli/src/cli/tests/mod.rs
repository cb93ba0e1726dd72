//! CLI parse and key binding tests.

use super::{parse_from, Invocation};

pub(super) fn parse(args: &[&str]) -> Invocation {
    parse_from(args.iter().copied()).unwrap()
}

mod key_lines;
