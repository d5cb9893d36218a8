//! Terminal output helpers.

use std::fmt::Write as _;
use std::time::Duration;

use crate::scanner::DecodeDebouncer;

/// Render rows as a left-aligned, space-padded table with a header rule.
#[must_use]
pub fn render_table<S: AsRef<str>>(columns: &[S], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.as_ref().chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    let mut out = String::new();
    let header: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
    push_line(&mut out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in rows {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map_or("", AsRef::as_ref);
        if i > 0 {
            line.push_str("  ");
        }
        let _ = write!(line, "{cell:<width$}");
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// What an operator line means during a scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    Confirm,
    Cancel,
    Quit,
    Code(String),
}

impl ScanInput {
    /// Classify a line typed at the scan prompt.
    ///
    /// An empty line confirms. Commands carry a `:` prefix so no QR code is
    /// mistaken for one: `:y`/`:yes` confirm, `:n`/`:no` cancel and
    /// `:q`/`:quit` end the session. Anything else is a code.
    #[must_use]
    pub fn classify(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Confirm;
        }
        let command = line.strip_prefix(':').map(str::to_ascii_lowercase);
        match command.as_deref() {
            Some("y" | "yes") => Self::Confirm,
            Some("n" | "no") => Self::Cancel,
            Some("q" | "quit") => Self::Quit,
            _ => Self::Code(line.to_string()),
        }
    }
}

/// Merges operator lines and scanner decodes into [`ScanInput`].
///
/// Scanner decodes are always codes and pass through the
/// [`DecodeDebouncer`]; typed lines are never debounced.
#[derive(Debug)]
pub struct ScanFeed {
    debouncer: DecodeDebouncer,
}

impl ScanFeed {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            debouncer: DecodeDebouncer::new(window),
        }
    }

    /// A line typed at the prompt. Any operator action ends the debounce
    /// window, so the same card can be scanned again right after a cancel.
    pub fn operator(&mut self, line: &str) -> ScanInput {
        self.debouncer.reset();
        ScanInput::classify(line)
    }

    /// A decode from the scanner device, `None` when it repeats the last
    /// one inside the debounce window.
    pub fn scanner(&mut self, decode: &str) -> Option<ScanInput> {
        let code = decode.trim();
        self.debouncer
            .accept(code)
            .then(|| ScanInput::Code(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table_aligns_columns() {
        let table = render_table(
            &["ID", "Name"],
            &[
                vec!["1".to_string(), "North".to_string()],
                vec!["10".to_string(), "Ñandú Sur".to_string()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "ID  Name");
        assert_eq!(lines[1], "--  ---------");
        assert_eq!(lines[2], "1   North");
        assert_eq!(lines[3], "10  Ñandú Sur");
    }

    #[test]
    fn test_render_table_empty() {
        let table = render_table(&["ID"], &[]);
        assert_eq!(table, "ID\n--\n");
    }

    #[test]
    fn test_classify_scan_input() {
        assert_eq!(ScanInput::classify(""), ScanInput::Confirm);
        assert_eq!(ScanInput::classify(" :Yes "), ScanInput::Confirm);
        assert_eq!(ScanInput::classify(":n"), ScanInput::Cancel);
        assert_eq!(ScanInput::classify(":QUIT"), ScanInput::Quit);
        assert_eq!(
            ScanInput::classify(" STU-0042 "),
            ScanInput::Code("STU-0042".to_string())
        );
    }

    #[test]
    fn test_bare_command_words_are_codes() {
        for word in ["y", "yes", "N", "no", "q", "Quit"] {
            assert_eq!(ScanInput::classify(word), ScanInput::Code(word.to_string()));
        }
        assert_eq!(
            ScanInput::classify(":stu-7"),
            ScanInput::Code(":stu-7".to_string())
        );
    }

    #[test]
    fn test_feed_debounces_scanner_only() {
        let mut feed = ScanFeed::new(Duration::from_secs(60));

        let code = ScanInput::Code("STU-1".to_string());
        assert_eq!(feed.scanner("STU-1\n"), Some(code.clone()));
        assert_eq!(feed.scanner("STU-1"), None);
        assert_eq!(feed.scanner("STU-2"), Some(ScanInput::Code("STU-2".to_string())));
        assert_eq!(feed.scanner("  "), None);

        assert_eq!(feed.operator("STU-1"), code);
        assert_eq!(feed.operator("STU-1"), code);
    }

    #[test]
    fn test_operator_line_reopens_scanner() {
        let mut feed = ScanFeed::new(Duration::from_secs(60));
        assert!(feed.scanner("STU-1").is_some());
        assert_eq!(feed.operator(":n"), ScanInput::Cancel);
        assert!(feed.scanner("STU-1").is_some());
    }
}
