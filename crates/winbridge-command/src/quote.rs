//! Literal-argument quoting for the two remote shells.
//!
//! Each function turns arbitrary text into one token the target shell
//! reads back as exactly that text. Neither can fail.

use std::iter;

use winbridge_core::ShellKind;

/// Quote `s` as one literal argument for `shell`.
#[must_use]
pub fn quote(shell: ShellKind, s: &str) -> String {
    match shell {
        ShellKind::PowerShell => quote_powershell(s),
        ShellKind::Cmd => quote_cmd(s),
    }
}

/// PowerShell verbatim string: `'...'` with every single-quote character doubled.
///
/// PowerShell also treats the typographic quotes U+2018..U+201B as single
/// quotes, so those are doubled too. No other character is special inside
/// a verbatim string, newlines included.
#[must_use]
pub fn quote_powershell(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if is_powershell_single_quote(c) {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}

const fn is_powershell_single_quote(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}')
}

/// cmd.exe argument: MSVCRT argv quoting, then caret-escaping of every
/// cmd metacharacter (the quotes included, so cmd never enters quote mode).
///
/// cmd cannot carry line breaks inside one command line; CR and LF are
/// replaced with spaces.
#[must_use]
pub fn quote_cmd(s: &str) -> String {
    let flat: String = s
        .chars()
        .map(|c| if matches!(c, '\r' | '\n') { ' ' } else { c })
        .collect();
    escape_cmd_metachars(&quote_argv(&flat))
}

fn quote_argv(s: &str) -> String {
    if !s.is_empty() && !s.contains([' ', '\t', '\u{b}', '"']) {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in s.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(iter::repeat_n('\\', backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    // Backslashes before the closing quote must not escape it.
    out.extend(iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    out
}

fn escape_cmd_metachars(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        if matches!(c, '(' | ')' | '%' | '!' | '^' | '"' | '<' | '>' | '&' | '|') {
            out.push('^');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    /// Reads a PowerShell verbatim string back.
    fn unquote_powershell(token: &str) -> Option<String> {
        let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if is_powershell_single_quote(c) {
                let next = chars.next()?;
                if next != c {
                    return None;
                }
            }
            out.push(c);
        }
        Some(out)
    }

    /// cmd.exe phase: drop carets, fail on any unescaped metacharacter.
    fn uncaret(token: &str) -> Option<String> {
        let mut out = String::new();
        let mut chars = token.chars();
        while let Some(c) = chars.next() {
            match c {
                '^' => out.push(chars.next()?),
                '(' | ')' | '%' | '!' | '"' | '<' | '>' | '&' | '|' => return None,
                _ => out.push(c),
            }
        }
        Some(out)
    }

    /// MSVCRT command-line splitting.
    fn parse_argv(line: &str) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        let mut args = Vec::new();
        let mut current = String::new();
        let mut have_arg = false;
        let mut in_quotes = false;
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    let start = i;
                    while i < chars.len() && chars[i] == '\\' {
                        i += 1;
                    }
                    let n = i - start;
                    if i < chars.len() && chars[i] == '"' {
                        current.extend(iter::repeat_n('\\', n / 2));
                        if n % 2 == 1 {
                            current.push('"');
                            i += 1;
                        }
                    } else {
                        current.extend(iter::repeat_n('\\', n));
                    }
                    have_arg = true;
                }
                '"' => {
                    in_quotes = !in_quotes;
                    have_arg = true;
                    i += 1;
                }
                ' ' | '\t' if !in_quotes => {
                    if have_arg {
                        args.push(std::mem::take(&mut current));
                        have_arg = false;
                    }
                    i += 1;
                }
                c => {
                    current.push(c);
                    have_arg = true;
                    i += 1;
                }
            }
        }
        if have_arg {
            args.push(current);
        }
        args
    }

    #[test]
    fn test_powershell_examples() {
        assert_eq!(quote_powershell("hello"), "'hello'");
        assert_eq!(quote_powershell("it's"), "'it''s'");
        assert_eq!(quote_powershell(""), "''");
        assert_eq!(quote_powershell("$env:TEMP"), "'$env:TEMP'");
        assert_eq!(quote_powershell("a\u{2019}b"), "'a\u{2019}\u{2019}b'");
    }

    #[test]
    fn test_cmd_examples() {
        assert_eq!(quote_cmd("hello"), "hello");
        assert_eq!(quote_cmd("hello world"), "^\"hello world^\"");
        assert_eq!(quote_cmd("a\"b"), "^\"a\\^\"b^\"");
        assert_eq!(quote_cmd("x&y"), "x^&y");
        assert_eq!(quote_cmd("%PATH%"), "^%PATH^%");
        assert_eq!(quote_cmd(""), "^\"^\"");
        assert_eq!(quote_cmd("C:\\dir with space\\"), "^\"C:\\dir with space\\\\^\"");
    }

    #[test]
    fn test_cmd_flattens_newlines() {
        assert_eq!(quote_cmd("a\r\nb"), "^\"a  b^\"");
    }

    #[test]
    fn test_quote_dispatch() {
        assert_eq!(quote(ShellKind::PowerShell, "a b"), "'a b'");
        assert_eq!(quote(ShellKind::Cmd, "a b"), "^\"a b^\"");
    }

    proptest! {
        #[test]
        fn prop_powershell_round_trip(s in any::<String>()) {
            let quoted = quote_powershell(&s);
            prop_assert_eq!(unquote_powershell(&quoted), Some(s));
        }

        #[test]
        fn prop_powershell_quotes_heavy(s in "['\u{2018}\u{2019}\"a $`\\n]{0,24}") {
            let quoted = quote_powershell(&s);
            prop_assert_eq!(unquote_powershell(&quoted), Some(s));
        }

        #[test]
        fn prop_cmd_round_trip(s in "[^\\r\\n\\x00]{0,40}") {
            let quoted = quote_cmd(&s);
            let unescaped = uncaret(&quoted);
            prop_assert!(unescaped.is_some(), "unescaped metacharacter in {}", quoted);
            prop_assert_eq!(parse_argv(&unescaped.unwrap_or_default()), vec![s]);
        }

        #[test]
        fn prop_cmd_quotes_heavy(s in "[\"\\\\ a&|<>^%!()]{0,24}") {
            let quoted = quote_cmd(&s);
            let unescaped = uncaret(&quoted).unwrap_or_default();
            prop_assert_eq!(parse_argv(&unescaped), vec![s]);
        }

        #[test]
        fn prop_cmd_never_panics(s in any::<String>()) {
            let quoted = quote_cmd(&s);
            prop_assert!(!quoted.contains('\n'));
        }
    }
}
